//! Data models for indexscope.
//!
//! Serialized field names are camelCase so exported documents read the same
//! as the JSON emitted by the command line front end.

mod document;
mod extension;
mod operation_result;
mod registration;
mod rule;

pub use document::*;
pub use extension::*;
pub use operation_result::*;
pub use registration::*;
pub use rule::*;
