mod bson;
mod collection;
pub mod errors;

pub use bson::Id;
pub use collection::{ensure_indexes_exist, user_index_key, Coll, MongoCollection};
