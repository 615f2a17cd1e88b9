use serde::{Deserialize, Serialize};

use crate::model::{
    common::{role::Role, time::now},
    db::user::{Credential, NewUser},
};

/// Details submitted by a voter signing up.
///
/// The password is in plaintext; a [`NewUser`] built from this must pass
/// through [`crate::model::db::user::prepare_for_storage`] before it can be
/// written.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub voter_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub aadhar_number: String,
    pub password: String,
    pub constituency: String,
    pub state: String,
}

impl From<UserRegistration> for NewUser {
    /// A newly registered user is an unverified voter who has not voted.
    fn from(registration: UserRegistration) -> Self {
        let created_at = now();
        Self {
            voter_id: registration.voter_id,
            name: registration.name,
            email: registration.email,
            phone: registration.phone,
            aadhar_number: registration.aadhar_number,
            password: Credential::Plaintext(registration.password),
            constituency: registration.constituency,
            state: registration.state,
            has_voted: false,
            is_verified: false,
            role: Role::Voter,
            created_at,
            updated_at: created_at,
        }
    }
}
