use std::{ops::Deref, time::Duration};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime},
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    Client, ClientSession, Database,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

use crate::error::{Error, Result};
use crate::model::{
    api::ballot::BallotSpec,
    common::{
        time::now,
        validation::{require, Validate, ValidationError},
    },
    db::{candidate::Candidate, user::User},
    mongodb::{errors::is_duplicate_key_error, Coll, Id},
};
use crate::Config;

/// Core vote data, as stored in the database.
///
/// A vote is never modified once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCore {
    /// The voter who cast this ballot. At most one vote exists per voter.
    pub voter_id: String,
    pub candidate_id: Id,
    pub constituency: String,
    pub state: String,
    /// When the ballot was cast.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Validate for VoteCore {
    fn normalise(&mut self) {}

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("voterId", &self.voter_id)?;
        require("constituency", &self.constituency)?;
        require("state", &self.state)?;
        require("ipAddress", &self.ip_address)?;
        Ok(())
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl Vote {
    /// Cast a voter's one and only ballot.
    ///
    /// Recording the vote, marking the voter as having voted, and counting
    /// the vote for the candidate happen in a single transaction: either all
    /// three are written, or none are. The unique index on the vote's
    /// `voterId` guarantees that, of several concurrent attempts by the same
    /// voter, at most one can ever commit; the others fail with
    /// [`Error::AlreadyVoted`].
    ///
    /// Transactions aborted by a transient error (e.g. a write conflict with
    /// such a concurrent attempt) are retried from scratch after a short,
    /// growing backoff, up to [`Config::transaction_retries`] times and
    /// within [`RETRY_DEADLINE`]. An attempt that runs out of retries is
    /// reported as [`Error::AlreadyVoted`] if the voter's ballot turns up
    /// shortly afterwards.
    pub async fn cast(
        db_client: &Client,
        db: &Database,
        config: &Config,
        ballot: BallotSpec,
    ) -> Result<Vote> {
        require("ipAddress", &ballot.ip_address)?;

        let users = Coll::<User>::from_db(db);
        let candidates = Coll::<Candidate>::from_db(db);
        let votes = Coll::<Vote>::from_db(db);

        let started = Instant::now();
        let mut retries = 0;
        loop {
            let mut session = db_client.start_session(None).await?;
            session.start_transaction(None).await?;

            let attempt =
                match Self::cast_in_session(&ballot, &users, &candidates, &votes, &mut session)
                    .await
                {
                    Ok(vote) => commit(&mut session, config.transaction_retries())
                        .await
                        .map(|()| vote),
                    Err(e) => {
                        // The server may already have aborted the transaction.
                        if let Err(abort_err) = session.abort_transaction().await {
                            trace!("Abort after failed ballot was not clean: {abort_err}");
                        }
                        Err(e)
                    }
                };

            match attempt {
                Ok(vote) => {
                    info!(
                        "Voter {} cast ballot {} in {}",
                        vote.voter_id, vote.id, vote.constituency
                    );
                    return Ok(vote);
                }
                Err(Error::Db(e)) if e.contains_label(TRANSIENT_TRANSACTION_ERROR) => {
                    if retries >= config.transaction_retries()
                        || started.elapsed() >= RETRY_DEADLINE
                    {
                        warn!(
                            "Giving up on ballot for voter {} after {retries} retries: {e}",
                            ballot.voter_id
                        );
                        return Err(settle_conflict(&votes, &ballot.voter_id, e.into()).await);
                    }
                    let delay = backoff(retries);
                    retries += 1;
                    warn!(
                        "Transient error casting ballot for voter {}, retrying in {delay:?} ({retries}/{}): {e}",
                        ballot.voter_id,
                        config.transaction_retries()
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    debug!("Ballot for voter {} rejected: {e}", ballot.voter_id);
                    return Err(e);
                }
            }
        }
    }

    /// The body of the vote-casting transaction.
    async fn cast_in_session(
        ballot: &BallotSpec,
        users: &Coll<User>,
        candidates: &Coll<Candidate>,
        votes: &Coll<Vote>,
        session: &mut ClientSession,
    ) -> Result<Vote> {
        // Check the voter may vote, and for this candidate.
        let voter = users
            .find_one_with_session(doc! { "voterId": &ballot.voter_id }, None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {}", ballot.voter_id)))?;
        if voter.has_voted {
            return Err(Error::AlreadyVoted(voter.voter_id.clone()));
        }
        let candidate = candidates
            .find_one_with_session(ballot.candidate_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {}", ballot.candidate_id)))?;
        if !candidate.is_active
            || candidate.constituency != voter.constituency
            || candidate.state != voter.state
        {
            return Err(Error::IneligibleCandidate(candidate.id.to_string()));
        }

        // Record the vote. The unique index is the final word on whether
        // this voter has voted.
        let cast_at = now();
        let vote = NewVote {
            voter_id: voter.voter_id.clone(),
            candidate_id: candidate.id,
            constituency: voter.constituency.clone(),
            state: voter.state.clone(),
            timestamp: cast_at,
            ip_address: ballot.ip_address.clone(),
            created_at: cast_at,
            updated_at: cast_at,
        };
        vote.validate()?;
        let vote = Vote {
            id: Id::new(),
            vote,
        };
        votes
            .insert_one_with_session(&vote, None, session)
            .await
            .map_err(|e| {
                if is_duplicate_key_error(&e) {
                    Error::AlreadyVoted(vote.voter_id.clone())
                } else {
                    e.into()
                }
            })?;

        // Mark the voter, only if nobody else has in the meantime.
        let filter = doc! { "_id": voter.id, "hasVoted": false };
        let update = doc! {
            "$set": { "hasVoted": true, "updatedAt": BsonDateTime::from_chrono(cast_at) }
        };
        let marked = users
            .update_one_with_session(filter, update, None, session)
            .await?;
        if marked.matched_count != 1 {
            return Err(Error::AlreadyVoted(voter.voter_id.clone()));
        }

        // Count the vote.
        let filter = doc! { "_id": candidate.id, "isActive": true };
        let update = doc! {
            "$inc": { "voteCount": 1_i64 },
            "$set": { "updatedAt": BsonDateTime::from_chrono(cast_at) },
        };
        let counted = candidates
            .update_one_with_session(filter, update, None, session)
            .await?;
        if counted.matched_count != 1 {
            return Err(Error::IneligibleCandidate(candidate.id.to_string()));
        }

        Ok(vote)
    }

    /// The ballot cast by the given voter, if they have voted.
    pub async fn find_by_voter(votes: &Coll<Vote>, voter_id: &str) -> Result<Option<Vote>> {
        Ok(votes
            .find_one(doc! { "voterId": voter_id }, None)
            .await?)
    }
}

/// Commit the session's transaction, retrying while the outcome is unknown.
async fn commit(session: &mut ClientSession, retries: u32) -> Result<()> {
    let mut attempts = 0;
    loop {
        match session.commit_transaction().await {
            Ok(()) => return Ok(()),
            Err(e) if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) && attempts < retries => {
                attempts += 1;
                warn!("Unknown transaction commit result, retrying ({attempts}/{retries}): {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Longest time spent retrying a single ballot.
pub const RETRY_DEADLINE: Duration = Duration::from_secs(10);
/// Delay before the first retry of a ballot; it doubles with each retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);
/// Longest single delay between retries.
const MAX_BACKOFF: Duration = Duration::from_secs(1);
/// How long a ballot that ran out of retries waits for a conflicting ballot
/// by the same voter to become visible.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// The delay before the given retry, with up to 50% random jitter so that
/// conflicting ballots do not retry in lockstep.
fn backoff(retry: u32) -> Duration {
    let base = RETRY_BACKOFF
        .saturating_mul(2_u32.saturating_pow(retry))
        .min(MAX_BACKOFF);
    let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter)
}

/// Decide the outcome of a ballot that kept conflicting with other
/// transactions.
///
/// The usual culprit is another ballot by the same voter that is still
/// committing. If that ballot appears within [`SETTLE_TIMEOUT`], this one
/// lost to it and is an [`Error::AlreadyVoted`]. Otherwise `err` stands.
async fn settle_conflict(votes: &Coll<Vote>, voter_id: &str, err: Error) -> Error {
    let waiting_since = Instant::now();
    let mut delay = RETRY_BACKOFF;
    loop {
        match Vote::find_by_voter(votes, voter_id).await {
            Ok(Some(vote)) => {
                debug!("Voter {voter_id} lost a race to ballot {}", vote.id);
                return Error::AlreadyVoted(voter_id.to_string());
            }
            Ok(None) if waiting_since.elapsed() < SETTLE_TIMEOUT => {
                sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
            Ok(None) => return err,
            Err(lookup_err) => {
                warn!("Could not check for an existing ballot by voter {voter_id}: {lookup_err}");
                return err;
            }
        }
    }
}
