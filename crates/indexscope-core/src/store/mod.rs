//! Configuration document persistence.

pub mod atomic;
mod configuration;

pub use configuration::{validate_document, validate_file, ConfigurationStore};
