//! Caller-supplied inputs.
//!
//! These carry only the fields a caller may choose. Everything else
//! (counters, flags, timestamps) is filled in when they are converted into
//! the stored types of [`crate::model::db`].

pub mod ballot;
pub mod candidate;
pub mod registration;
