//! The persisted data model.
//!
//! - [`api`] holds the inputs callers supply when creating records.
//! - [`common`] holds types and rules shared by several records.
//! - [`db`] holds the records as stored, and the operations that store them.
//! - [`mongodb`] holds the glue between the records and the database.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
