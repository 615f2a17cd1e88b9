use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

/// The current time, at the millisecond precision the database stores.
///
/// Using this for every timestamp means a record read back from the
/// database compares equal to the one that was written.
pub fn now() -> DateTime<Utc> {
    BsonDateTime::now().to_chrono()
}
