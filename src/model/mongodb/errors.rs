//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;

/// If the given error is a duplicate key error, return the server's message.
fn duplicate_key_message(err: &DbError) -> Option<&str> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY => {
            Some(&e.message)
        }
        ErrorKind::Command(ref e) if e.code == DUPLICATE_KEY => Some(&e.message),
        _ => None,
    }
}

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    duplicate_key_message(err).is_some()
}

/// If the given error is a duplicate key error, return the name of the
/// unique index that was violated.
pub fn duplicate_key_index(err: &DbError) -> Option<&str> {
    duplicate_key_message(err).and_then(index_from_message)
}

/// Extract the index name from a message of the form
/// `E11000 duplicate key error collection: db.users index: email_unique dup key: { ... }`.
fn index_from_message(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once(" index: ")?;
    rest.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_from_server_message() {
        let message = "E11000 duplicate key error collection: evote.users \
index: email_unique dup key: { email: \"asha@example.com\" }";
        assert_eq!(index_from_message(message), Some("email_unique"));

        let message = "E11000 duplicate key error collection: test1.votes \
index: one_vote_per_voter dup key: { voterId: \"ABC1234567\" }";
        assert_eq!(index_from_message(message), Some("one_vote_per_voter"));

        assert_eq!(index_from_message("WriteConflict"), None);
    }
}
