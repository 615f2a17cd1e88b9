use std::fmt::{Debug, Formatter};

use argon2::{Config, Error as Argon2Error};
use rand::Rng;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use tokio::task;

use crate::error::Result;

/// Number of argon2 passes over memory when hashing a password.
pub const HASH_COST: u32 = 12;

// 16 bytes is recommended for password hashing:
//  https://en.wikipedia.org/wiki/Argon2
const SALT_LENGTH: usize = 16;

/// A user's password.
///
/// Only the [`Credential::Hashed`] form can be serialised, so a plaintext
/// password can never reach the database: attempting to write one fails
/// at serialisation time.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// An encoded, salted argon2 hash, as stored.
    Hashed(String),
    /// A password supplied by the user that has not been hashed yet.
    Plaintext(String),
}

impl Credential {
    /// Has this password been changed since it was last stored?
    pub fn is_modified(&self) -> bool {
        matches!(self, Self::Plaintext(_))
    }

    /// Check whether `candidate` is the password this credential was hashed from.
    ///
    /// A plaintext credential never verifies: passwords are only ever
    /// compared through the hash.
    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            Self::Hashed(hash) => argon2::verify_encoded(hash, candidate.as_bytes())
                .unwrap_or_else(|e| {
                    warn!("Stored password hash could not be decoded: {e}");
                    false
                }),
            Self::Plaintext(_) => false,
        }
    }

    /// Replace a plaintext password with its hash, on a blocking worker thread.
    /// An already-hashed credential is returned untouched.
    pub async fn into_hashed(self) -> Result<Self> {
        match self {
            Self::Hashed(_) => Ok(self),
            Self::Plaintext(password) => {
                let hash = task::spawn_blocking(move || hash_password(&password)).await??;
                Ok(Self::Hashed(hash))
            }
        }
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> std::result::Result<String, Argon2Error> {
    let mut salt = [0_u8; SALT_LENGTH];
    rand::thread_rng().fill(&mut salt);
    let config = Config {
        time_cost: HASH_COST,
        ..Config::default()
    };
    argon2::hash_encoded(password.as_bytes(), &salt, &config)
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hashed(_) => f.write_str("Hashed(..)"),
            Self::Plaintext(_) => f.write_str("Plaintext(..)"),
        }
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Hashed(hash) => serializer.serialize_str(hash),
            Self::Plaintext(_) => Err(ser::Error::custom(
                "refusing to serialise a plaintext password",
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hash = String::deserialize(deserializer)?;
        if hash.is_empty() {
            return Err(de::Error::custom("stored password hash is empty"));
        }
        Ok(Self::Hashed(hash))
    }
}
