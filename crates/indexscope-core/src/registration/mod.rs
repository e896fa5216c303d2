//! Detection and repair of the search manager registration.

pub mod audit;
mod detector;
mod orchestrator;
pub mod prompt;
pub mod repair;

pub use audit::{AuditSink, FanOutAuditSink, JsonLinesAuditSink, MemoryAuditSink, TracingAuditSink};
pub use detector::RegistrationDetector;
pub use orchestrator::RegistrationOrchestrator;
pub use prompt::{NonInteractivePrompt, RegistrationPrompt, RepairChoice};
pub use repair::{Regsvr32, RepairCommand, RepairInvocation};
