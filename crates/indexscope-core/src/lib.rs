//! IndexScope Core - headless library for managing Windows Search indexing scope.
//!
//! The crate covers three pieces that cooperate around the native indexing
//! subsystem:
//! - `registration` - detecting and repairing the search manager access point
//! - `rules` - CRUD on crawl scope rules and per-extension indexing depth
//! - `store` - export, import and validation of portable configuration documents
//!
//! The native subsystem is reached only through the traits in [`native`], so
//! everything above it runs (and is tested) on any host.
//!
//! # Example
//!
//! ```rust,ignore
//! use indexscope_core::{IndexScope, NonInteractivePrompt};
//!
//! #[tokio::main]
//! async fn main() -> indexscope_core::Result<()> {
//!     let scope = IndexScope::builder().with_system_backend()?.build()?;
//!
//!     let args: Vec<String> = std::env::args().collect();
//!     if !scope.ensure_usable(&args, &NonInteractivePrompt).await? {
//!         return Ok(());
//!     }
//!
//!     for rule in scope.rules().list_rules(false)? {
//!         println!("{:?} {}", rule.rule_type, rule.path);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod native;
pub mod platform;
pub mod registration;
pub mod rules;
pub mod store;

mod api;

pub use api::{IndexScope, IndexScopeBuilder};
pub use error::{ErrorKind, IndexScopeError, NativeFault, Result};
pub use models::{
    ConfigurationDocument, FileExtensionSetting, FileTypeFilter, FilterTarget, FilterType,
    ImportResult, IndexRule, IndexingDepth, OperationResult, RegistrationAttempt,
    RegistrationMode, RegistrationOptions, RegistrationOutcome, RegistrationStatus, RuleSource,
    RuleType, ValidationResult, ValidationState,
};
pub use registration::{
    AuditSink, FanOutAuditSink, JsonLinesAuditSink, MemoryAuditSink, NonInteractivePrompt,
    RegistrationDetector, RegistrationOrchestrator, RegistrationPrompt, RepairChoice,
    TracingAuditSink,
};
pub use rules::IndexRuleManager;
pub use store::ConfigurationStore;
