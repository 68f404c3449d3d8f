//! wizardflow library
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod config;
pub mod records;
pub mod report;
pub mod workflows;

pub use config::Config;
pub use records::{load_records, read_records, RecordsError};
