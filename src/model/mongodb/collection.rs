use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::{
    common::unique::UniqueKey,
    db::{
        candidate::Candidate,
        user::User,
        vote::Vote,
    },
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Collection names
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}

/// Name of the unique index on `users.voterId`.
pub const USER_VOTER_ID_INDEX: &str = "voterId_unique";
/// Name of the unique index on `users.email`.
pub const USER_EMAIL_INDEX: &str = "email_unique";
/// Name of the unique index on `users.aadharNumber`.
pub const USER_AADHAR_NUMBER_INDEX: &str = "aadharNumber_unique";
/// Name of the unique index on `votes.voterId`: one ballot per voter, ever.
pub const VOTE_VOTER_ID_INDEX: &str = "one_vote_per_voter";
/// Name of the index used to list a constituency's ballot.
pub const CANDIDATE_BALLOT_INDEX: &str = "ballot";

/// The identity key guarded by the given unique index on the user collection.
pub fn user_index_key(index: &str) -> Option<UniqueKey> {
    match index {
        USER_VOTER_ID_INDEX => Some(UniqueKey::VoterId),
        USER_EMAIL_INDEX => Some(UniqueKey::Email),
        USER_AADHAR_NUMBER_INDEX => Some(UniqueKey::AadharNumber),
        _ => None,
    }
}

fn unique_index(field: &str, name: &str) -> IndexModel {
    let options = IndexOptions::builder()
        .unique(true)
        .name(name.to_string())
        .build();
    IndexModel::builder()
        .keys(doc! { field: 1 })
        .options(options)
        .build()
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // User collection: three independent identity keys.
    let user_indexes = [
        (UniqueKey::VoterId, USER_VOTER_ID_INDEX),
        (UniqueKey::Email, USER_EMAIL_INDEX),
        (UniqueKey::AadharNumber, USER_AADHAR_NUMBER_INDEX),
    ]
    .into_iter()
    .map(|(key, name)| unique_index(key.field(), name));
    Coll::<User>::from_db(db)
        .create_indexes(user_indexes, None)
        .await?;

    // Vote collection.
    Coll::<Vote>::from_db(db)
        .create_index(unique_index("voterId", VOTE_VOTER_ID_INDEX), None)
        .await?;

    // Candidate collection.
    let ballot_index = IndexModel::builder()
        .keys(doc! { "state": 1, "constituency": 1, "isActive": 1 })
        .options(
            IndexOptions::builder()
                .name(CANDIDATE_BALLOT_INDEX.to_string())
                .build(),
        )
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;

    #[test]
    fn index_names_resolve_to_keys() {
        assert_eq!(user_index_key(USER_VOTER_ID_INDEX), Some(UniqueKey::VoterId));
        assert_eq!(user_index_key(USER_EMAIL_INDEX), Some(UniqueKey::Email));
        assert_eq!(
            user_index_key(USER_AADHAR_NUMBER_INDEX),
            Some(UniqueKey::AadharNumber)
        );
        assert_eq!(user_index_key(VOTE_VOTER_ID_INDEX), None);
        assert_eq!(user_index_key("_id_"), None);
    }

    #[backend_test]
    async fn indexes_are_idempotent(db: Database) {
        // The harness has already created them once.
        ensure_indexes_exist(&db).await.unwrap();

        let names: Vec<String> = Coll::<User>::from_db(&db)
            .list_index_names()
            .await
            .unwrap();
        for name in [USER_VOTER_ID_INDEX, USER_EMAIL_INDEX, USER_AADHAR_NUMBER_INDEX] {
            assert!(names.iter().any(|n| n == name), "missing index {name}");
        }

        let vote_indexes: Vec<IndexModel> = Coll::<Vote>::from_db(&db)
            .list_indexes(None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let one_vote = vote_indexes
            .iter()
            .find(|index| {
                index.options.as_ref().and_then(|o| o.name.as_deref()) == Some(VOTE_VOTER_ID_INDEX)
            })
            .unwrap();
        assert_eq!(one_vote.options.as_ref().unwrap().unique, Some(true));
    }
}
