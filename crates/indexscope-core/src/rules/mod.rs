//! Scope rule and extension depth management.

mod manager;
pub mod wildcard;

pub use manager::IndexRuleManager;
pub use wildcard::{wildcard_match, WildcardPattern};
