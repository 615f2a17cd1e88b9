use argon2::Error as Argon2Error;
use mongodb::{bson::ser::Error as BsonError, error::Error as DbError};
use thiserror::Error;
use tokio::task::JoinError;

use crate::model::common::{unique::UniqueKey, validation::ValidationError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{0} already registered")]
    Duplicate(UniqueKey),
    #[error("Voter {0} has already voted")]
    AlreadyVoted(String),
    #[error("Candidate {0} is not on this voter's ballot")]
    IneligibleCandidate(String),
    #[error("Authentication failed")]
    AuthenticationFailure,
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Is this a uniqueness violation of any kind, i.e. would repeating the
    /// same write with the same input fail again?
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_) | Self::AlreadyVoted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_distinguishable() {
        assert!(Error::Duplicate(UniqueKey::Email).is_duplicate());
        assert!(Error::AlreadyVoted("ABC1234567".to_string()).is_duplicate());
        assert!(!Error::AuthenticationFailure.is_duplicate());
        assert!(!Error::not_found("User").is_duplicate());
        assert!(!Error::Validation(ValidationError::Missing("email")).is_duplicate());

        assert_eq!(
            Error::Duplicate(UniqueKey::AadharNumber).to_string(),
            "Aadhar number already registered"
        );
    }
}
