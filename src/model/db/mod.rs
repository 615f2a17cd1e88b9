//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Field names are camelCase.
//!
//! Each record comes in two flavours: a `*Core` holding the fields, aliased
//! as `New*` for records that have not been written, and the full record
//! with its unique ID. Operations that touch the database are associated
//! functions on the full record, taking the collections they use.

pub mod candidate;
pub mod user;
pub mod vote;
