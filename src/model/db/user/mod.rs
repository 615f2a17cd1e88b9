use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{
        doc, serde_helpers::chrono_datetime_as_bson_datetime, to_document,
        DateTime as BsonDateTime, Document,
    },
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};
use tokio::task;

use crate::error::{Error, Result};
use crate::model::{
    api::registration::UserRegistration,
    common::{
        role::Role,
        time::now,
        validation::{
            is_aadhar_number, is_phone, is_voter_id, min_chars, require, require_format,
            trim_in_place, Validate, ValidationError, PASSWORD_MIN_CHARS,
        },
    },
    mongodb::{errors::duplicate_key_index, user_index_key, Coll, Id},
};

mod credential;
pub use credential::{hash_password, Credential, HASH_COST};

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCore {
    /// Electoral roll ID, e.g. `ABC1234567`.
    pub voter_id: String,
    pub name: String,
    pub email: String,
    /// Ten-digit mobile number.
    pub phone: String,
    /// Twelve-digit national ID number.
    pub aadhar_number: String,
    pub password: Credential,
    pub constituency: String,
    pub state: String,
    /// Only ever set, once, by [`crate::model::db::vote::Vote::cast`].
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserCore {
    /// Replace the password. It will be hashed by [`prepare_for_storage`].
    pub fn set_password(&mut self, plaintext: impl Into<String>) {
        self.password = Credential::Plaintext(plaintext.into());
    }

    /// Check whether the given password is correct.
    ///
    /// This hashes `candidate`, so may take a while; see
    /// [`User::authenticate`] for a version that does not block.
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password.verify(candidate)
    }
}

impl Validate for UserCore {
    fn normalise(&mut self) {
        trim_in_place(&mut self.name);
        if self.email.chars().any(char::is_uppercase) {
            self.email = self.email.to_lowercase();
        }
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require_format("voterId", &self.voter_id, is_voter_id)?;
        require("name", &self.name)?;
        require("email", &self.email)?;
        require_format("phone", &self.phone, is_phone)?;
        require_format("aadharNumber", &self.aadhar_number, is_aadhar_number)?;
        match self.password {
            Credential::Plaintext(ref password) => {
                require("password", password)?;
                min_chars("password", password, PASSWORD_MIN_CHARS)?;
            }
            Credential::Hashed(ref hash) => require("password", hash)?,
        }
        require("constituency", &self.constituency)?;
        require("state", &self.state)?;
        Ok(())
    }
}

/// Normalise and validate a user, then hash their password if it has been
/// changed since it was last stored.
///
/// Every write of a user goes through here. An unchanged password is passed
/// through byte-for-byte, so it is never hashed twice.
pub async fn prepare_for_storage(mut user: UserCore) -> Result<UserCore> {
    user.normalise();
    user.validate()?;
    if user.password.is_modified() {
        trace!("Hashing new password for voter {}", user.voter_id);
    }
    user.password = user.password.into_hashed().await?;
    Ok(user)
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with their unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// One of the identity keys a user can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity<'a> {
    VoterId(&'a str),
    Email(&'a str),
    AadharNumber(&'a str),
}

impl Identity<'_> {
    /// A filter matching the (at most one) user with this identity.
    pub fn as_doc(&self) -> Document {
        match *self {
            Self::VoterId(voter_id) => doc! { "voterId": voter_id },
            // Emails are stored lowercased.
            Self::Email(email) => doc! { "email": email.to_lowercase() },
            Self::AadharNumber(number) => doc! { "aadharNumber": number },
        }
    }
}

/// Translate a failed user write into a domain error, naming the identity
/// key that was already taken.
fn map_write_error(err: DbError) -> Error {
    if let Some(key) = duplicate_key_index(&err).and_then(user_index_key) {
        return Error::Duplicate(key);
    }
    Error::Db(err)
}

impl User {
    /// Register a new, unverified voter.
    ///
    /// Fails with [`Error::Duplicate`] if any of the voter ID, email or
    /// Aadhar number is already registered.
    pub async fn register(users: &Coll<User>, registration: UserRegistration) -> Result<User> {
        let user = prepare_for_storage(registration.into()).await?;
        let user = User {
            id: Id::new(),
            user,
        };
        users
            .insert_one(&user, None)
            .await
            .map_err(map_write_error)?;
        info!("Registered voter {} as user {}", user.voter_id, user.id);
        Ok(user)
    }

    pub async fn find(users: &Coll<User>, identity: Identity<'_>) -> Result<Option<User>> {
        Ok(users.find_one(identity.as_doc(), None).await?)
    }

    /// Look up a user and check their password.
    ///
    /// Fails with [`Error::NotFound`] if there is no such user, and with
    /// [`Error::AuthenticationFailure`] if the password is wrong.
    pub async fn authenticate(
        users: &Coll<User>,
        identity: Identity<'_>,
        password: &str,
    ) -> Result<User> {
        let user = Self::find(users, identity)
            .await?
            .ok_or_else(|| Error::not_found(format!("User {identity:?}")))?;

        let credential = user.password.clone();
        let password = password.to_string();
        let verified = task::spawn_blocking(move || credential.verify(&password)).await?;
        if !verified {
            warn!("Failed authentication attempt for user {}", user.id);
            return Err(Error::AuthenticationFailure);
        }
        debug!("Authenticated user {}", user.id);
        Ok(user)
    }

    /// Write back changes to a user, hashing the password only if it was
    /// changed with [`UserCore::set_password`].
    ///
    /// `hasVoted` and `createdAt` are never overwritten from here, so a
    /// voter who voted since `user` was read stays marked as having voted.
    /// The user returned is the record as stored after the write.
    pub async fn save(users: &Coll<User>, user: User) -> Result<User> {
        let User { id, user } = user;
        let mut user = prepare_for_storage(user).await?;
        user.updated_at = now();

        let mut fields = to_document(&user)?;
        fields.remove("hasVoted");
        fields.remove("createdAt");
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let saved = users
            .find_one_and_update(id.as_doc(), doc! { "$set": fields }, options)
            .await
            .map_err(map_write_error)?
            .ok_or_else(|| Error::not_found(format!("User {id}")))?;
        debug!("Saved user {id}");
        Ok(saved)
    }

    /// Mark a user's identity as checked (or not).
    pub async fn set_verified(users: &Coll<User>, id: Id, verified: bool) -> Result<()> {
        let update = doc! {
            "$set": { "isVerified": verified, "updatedAt": BsonDateTime::now() }
        };
        let result = users.update_one(id.as_doc(), update, None).await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("User {id}")));
        }
        info!("User {id} verified: {verified}");
        Ok(())
    }
}
