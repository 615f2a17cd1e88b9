use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// What a user is allowed to do.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May cast a single ballot.
    #[default]
    Voter,
    /// Manages candidates and voter verification.
    Admin,
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_as_lowercase_string() {
        assert_eq!(Bson::from(Role::Voter), Bson::String("voter".to_string()));
        assert_eq!(Bson::from(Role::Admin), Bson::String("admin".to_string()));
        assert_eq!(Role::default(), Role::Voter);
    }
}
