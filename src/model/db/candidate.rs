use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{
        doc, serde_helpers::chrono_datetime_as_bson_datetime, to_document, Bson,
        DateTime as BsonDateTime,
    },
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::CandidateSpec,
    common::{
        time::now,
        validation::{
            at_least, max_chars, require, trim_in_place, Validate, ValidationError,
            CANDIDATE_MIN_AGE, MANIFESTO_MAX_CHARS,
        },
    },
    mongodb::{Coll, Id},
};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCore {
    pub name: String,
    pub party: String,
    /// The party or independent symbol shown on the ballot.
    pub symbol: String,
    pub constituency: String,
    pub state: String,
    pub age: i32,
    pub education: String,
    #[serde(default)]
    pub criminal_record: bool,
    /// Declared assets, in rupees.
    #[serde(default)]
    pub assets: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifesto: Option<String>,
    #[serde(default)]
    pub photo_url: String,
    /// Number of accepted ballots for this candidate. Only ever changed by
    /// [`crate::model::db::vote::Vote::cast`].
    #[serde(default)]
    pub vote_count: i64,
    /// Inactive candidates are left off ballots, but keep their history.
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

fn active_by_default() -> bool {
    true
}

impl Validate for CandidateCore {
    fn normalise(&mut self) {
        trim_in_place(&mut self.name);
        trim_in_place(&mut self.party);
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        require("name", &self.name)?;
        require("party", &self.party)?;
        require("symbol", &self.symbol)?;
        require("constituency", &self.constituency)?;
        require("state", &self.state)?;
        at_least("age", self.age.into(), CANDIDATE_MIN_AGE.into())?;
        require("education", &self.education)?;
        if let Some(ref manifesto) = self.manifesto {
            max_chars("manifesto", manifesto, MANIFESTO_MAX_CHARS)?;
        }
        Ok(())
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

impl Candidate {
    /// Validate and insert a new candidate.
    pub async fn create(candidates: &Coll<Candidate>, spec: CandidateSpec) -> Result<Candidate> {
        let mut candidate: NewCandidate = spec.into();
        candidate.normalise();
        candidate.validate()?;

        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        candidates.insert_one(&candidate, None).await?;
        info!(
            "Created candidate {} ({}) for {}",
            candidate.id, candidate.name, candidate.constituency
        );
        Ok(candidate)
    }

    pub async fn find_by_id(candidates: &Coll<Candidate>, id: Id) -> Result<Option<Candidate>> {
        Ok(candidates.find_one(id.as_doc(), None).await?)
    }

    /// The active candidates standing in a constituency, ordered by name.
    pub async fn ballot(
        candidates: &Coll<Candidate>,
        constituency: &str,
        state: &str,
    ) -> Result<Vec<Candidate>> {
        let filter = doc! {
            "state": state,
            "constituency": constituency,
            "isActive": true,
        };
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let ballot = candidates
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(ballot)
    }

    /// Write back an administrator's edits.
    ///
    /// Every field is overwritten except `voteCount`, `isActive` and
    /// `createdAt`, so votes counted and ballot changes made since
    /// `candidate` was read are never lost. `candidate` is then refreshed
    /// from the stored record.
    pub async fn update_details(
        candidates: &Coll<Candidate>,
        candidate: &mut Candidate,
    ) -> Result<()> {
        candidate.normalise();
        candidate.validate()?;
        candidate.updated_at = now();

        let mut fields = to_document(&candidate.candidate)?;
        fields.remove("voteCount");
        fields.remove("isActive");
        fields.remove("createdAt");
        if candidate.manifesto.is_none() {
            // Skipped during serialisation, so clear it explicitly.
            fields.insert("manifesto", Bson::Null);
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let id = candidate.id;
        *candidate = candidates
            .find_one_and_update(id.as_doc(), doc! { "$set": fields }, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        debug!("Updated details of candidate {id}");
        Ok(())
    }

    /// Put a candidate on, or take them off, their constituency's ballot.
    pub async fn set_active(candidates: &Coll<Candidate>, id: Id, active: bool) -> Result<()> {
        let update = doc! {
            "$set": { "isActive": active, "updatedAt": BsonDateTime::now() }
        };
        let result = candidates.update_one(id.as_doc(), update, None).await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Candidate {id}")));
        }
        info!("Candidate {id} is now {}", if active { "active" } else { "inactive" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mongodb::{bson::from_document, Database};

    use super::*;

    fn example() -> NewCandidate {
        CandidateSpec::example().into()
    }

    #[test]
    fn minimum_age() {
        let mut candidate = example();
        candidate.age = 24;
        assert_eq!(
            candidate.validate(),
            Err(ValidationError::BelowMinimum { field: "age", min: 25 })
        );

        candidate.age = 25;
        assert_eq!(candidate.validate(), Ok(()));

        candidate.age = -40;
        assert!(candidate.validate().is_err());
    }

    #[test]
    fn manifesto_length() {
        let mut candidate = example();
        candidate.manifesto = Some("m".repeat(1001));
        assert_eq!(
            candidate.validate(),
            Err(ValidationError::TooLong {
                field: "manifesto",
                max: 1000
            })
        );

        candidate.manifesto = Some("m".repeat(1000));
        assert_eq!(candidate.validate(), Ok(()));

        candidate.manifesto = None;
        assert_eq!(candidate.validate(), Ok(()));
    }

    #[test]
    fn required_fields() {
        let mut candidate = example();
        candidate.symbol.clear();
        assert_eq!(candidate.validate(), Err(ValidationError::Missing("symbol")));

        // Whitespace-only names are empty once trimmed.
        let mut candidate = example();
        candidate.party = "   ".to_string();
        candidate.normalise();
        assert_eq!(candidate.validate(), Err(ValidationError::Missing("party")));
    }

    #[test]
    fn name_and_party_are_trimmed() {
        let mut candidate = example();
        candidate.name = "  Meera Iyer ".to_string();
        candidate.party = "\tProgressive Front".to_string();
        candidate.symbol = " Lamp ".to_string();
        candidate.normalise();
        assert_eq!(candidate.name, "Meera Iyer");
        assert_eq!(candidate.party, "Progressive Front");
        assert_eq!(candidate.symbol, " Lamp ");
    }

    #[test]
    fn stored_defaults() {
        let document = doc! {
            "_id": Id::new(),
            "name": "Meera Iyer",
            "party": "Progressive Front",
            "symbol": "Lamp",
            "constituency": "Chennai South",
            "state": "Tamil Nadu",
            "age": 48,
            "education": "MA Economics",
            "createdAt": BsonDateTime::now(),
            "updatedAt": BsonDateTime::now(),
        };
        let candidate: Candidate = from_document(document).unwrap();
        assert!(candidate.is_active);
        assert!(!candidate.criminal_record);
        assert_eq!(candidate.vote_count, 0);
        assert_eq!(candidate.photo_url, "");
    }

    #[backend_test]
    async fn create_and_find(candidates: Coll<Candidate>) {
        let created = Candidate::create(&candidates, CandidateSpec::example())
            .await
            .unwrap();
        let found = Candidate::find_by_id(&candidates, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, created);
        assert_eq!(found.vote_count, 0);
        assert!(found.is_active);

        assert!(Candidate::find_by_id(&candidates, Id::new())
            .await
            .unwrap()
            .is_none());
    }

    #[backend_test]
    async fn invalid_candidate_is_not_written(candidates: Coll<Candidate>) {
        let spec = CandidateSpec {
            age: 24,
            ..CandidateSpec::example()
        };
        let result = Candidate::create(&candidates, spec).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(candidates.count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn ballot_lists_active_candidates(db: Database) {
        let candidates = Coll::<Candidate>::from_db(&db);
        let meera = Candidate::create(&candidates, CandidateSpec::example())
            .await
            .unwrap();
        let karthik = Candidate::create(&candidates, CandidateSpec::example2())
            .await
            .unwrap();
        Candidate::create(&candidates, CandidateSpec::elsewhere_example())
            .await
            .unwrap();

        let ballot = Candidate::ballot(&candidates, "Chennai South", "Tamil Nadu")
            .await
            .unwrap();
        let ids: Vec<Id> = ballot.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![karthik.id, meera.id]);

        Candidate::set_active(&candidates, karthik.id, false)
            .await
            .unwrap();
        let ballot = Candidate::ballot(&candidates, "Chennai South", "Tamil Nadu")
            .await
            .unwrap();
        assert_eq!(ballot.len(), 1);
        assert_eq!(ballot[0].id, meera.id);

        // Still there, just hidden.
        let karthik = Candidate::find_by_id(&candidates, karthik.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!karthik.is_active);

        let missing = Candidate::set_active(&candidates, Id::new(), true).await;
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }

    #[backend_test]
    async fn update_details_keeps_concurrent_changes(candidates: Coll<Candidate>) {
        let mut stale = Candidate::create(&candidates, CandidateSpec::example())
            .await
            .unwrap();

        // A vote lands after the administrator loaded the record.
        candidates
            .update_one(stale.id.as_doc(), doc! { "$inc": { "voteCount": 1_i64 } }, None)
            .await
            .unwrap();

        // And someone takes the candidate off the ballot.
        Candidate::set_active(&candidates, stale.id, false)
            .await
            .unwrap();

        stale.manifesto = None;
        stale.party = " Independent ".to_string();
        Candidate::update_details(&candidates, &mut stale)
            .await
            .unwrap();
        assert_eq!(stale.vote_count, 1);
        assert!(!stale.is_active);

        let stored = Candidate::find_by_id(&candidates, stale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, stale);
        assert_eq!(stored.vote_count, 1);
        assert!(!stored.is_active);
        assert_eq!(stored.party, "Independent");
        assert_eq!(stored.manifesto, None);
        assert_eq!(stored.created_at, stale.created_at);
    }
}
