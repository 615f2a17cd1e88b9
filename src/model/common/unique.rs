use std::fmt::{Display, Formatter};

/// An identity key: a user field guaranteed to resolve to at most one user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    VoterId,
    Email,
    AadharNumber,
}

impl UniqueKey {
    /// The stored field name.
    pub const fn field(self) -> &'static str {
        match self {
            Self::VoterId => "voterId",
            Self::Email => "email",
            Self::AadharNumber => "aadharNumber",
        }
    }
}

impl Display for UniqueKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::VoterId => "Voter ID",
            Self::Email => "Email",
            Self::AadharNumber => "Aadhar number",
        };
        f.write_str(name)
    }
}
