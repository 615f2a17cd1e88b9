use serde::{Deserialize, Serialize};

use crate::model::{common::time::now, db::candidate::NewCandidate};

/// A candidate as entered by an administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    pub symbol: String,
    pub constituency: String,
    pub state: String,
    pub age: i32,
    pub education: String,
    #[serde(default)]
    pub criminal_record: bool,
    #[serde(default)]
    pub assets: f64,
    #[serde(default)]
    pub manifesto: Option<String>,
    #[serde(default)]
    pub photo_url: String,
}

impl From<CandidateSpec> for NewCandidate {
    /// A new candidate starts active, with no votes.
    fn from(spec: CandidateSpec) -> Self {
        let created_at = now();
        Self {
            name: spec.name,
            party: spec.party,
            symbol: spec.symbol,
            constituency: spec.constituency,
            state: spec.state,
            age: spec.age,
            education: spec.education,
            criminal_record: spec.criminal_record,
            assets: spec.assets,
            manifesto: spec.manifesto,
            photo_url: spec.photo_url,
            vote_count: 0,
            is_active: true,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateSpec {
        pub fn example() -> Self {
            Self {
                name: "Meera Iyer".to_string(),
                party: "Progressive Front".to_string(),
                symbol: "Lamp".to_string(),
                constituency: "Chennai South".to_string(),
                state: "Tamil Nadu".to_string(),
                age: 48,
                education: "MA Economics".to_string(),
                criminal_record: false,
                assets: 2_500_000.0,
                manifesto: Some("Clean water for every ward.".to_string()),
                photo_url: String::new(),
            }
        }

        pub fn example2() -> Self {
            Self {
                name: "Karthik Raman".to_string(),
                party: "People's Alliance".to_string(),
                symbol: "Kite".to_string(),
                ..Self::example()
            }
        }

        /// A candidate standing somewhere else.
        pub fn elsewhere_example() -> Self {
            Self {
                name: "Harpreet Gill".to_string(),
                constituency: "Amritsar".to_string(),
                state: "Punjab".to_string(),
                ..Self::example()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{doc, from_document};

    use super::*;

    #[test]
    fn optional_fields_take_defaults() {
        let document = doc! {
            "name": "Meera Iyer",
            "party": "Progressive Front",
            "symbol": "Lamp",
            "constituency": "Chennai South",
            "state": "Tamil Nadu",
            "age": 48,
            "education": "MA Economics",
        };
        let spec: CandidateSpec = from_document(document).unwrap();
        assert!(!spec.criminal_record);
        assert_eq!(spec.assets, 0.0);
        assert_eq!(spec.manifesto, None);
        assert_eq!(spec.photo_url, "");

        let candidate = NewCandidate::from(spec);
        assert_eq!(candidate.vote_count, 0);
        assert!(candidate.is_active);
        assert_eq!(candidate.created_at, candidate.updated_at);
    }
}
