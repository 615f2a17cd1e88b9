#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod config;
pub mod error;
pub mod model;

pub use config::Config;
pub use error::{Error, Result};
