use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A voter's choice of candidate, as submitted.
///
/// Constituency and state are taken from the voter's own record when the
/// ballot is cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotSpec {
    pub voter_id: String,
    pub candidate_id: Id,
    pub ip_address: String,
}
