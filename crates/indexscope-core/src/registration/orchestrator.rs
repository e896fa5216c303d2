//! Repair of a missing or broken access point registration.
//!
//! `register` runs one repair attempt and always produces an audited
//! [`RegistrationAttempt`]. `handle_missing_registration` decides, from the
//! command-line flags and the user's answer, whether an attempt runs at all.

use super::audit::AuditSink;
use super::detector::RegistrationDetector;
use super::prompt::{RegistrationPrompt, RepairChoice};
use super::repair::{run_repair, Regsvr32, RepairCommand, RepairExit};
use crate::error::Result;
use crate::models::{
    RegistrationAttempt, RegistrationMode, RegistrationOptions, RegistrationOutcome,
    RegistrationStatus, ValidationState,
};
use crate::platform::current_user;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub struct RegistrationOrchestrator {
    detector: RegistrationDetector,
    is_elevated: bool,
    audit: Arc<dyn AuditSink>,
    repair: Box<dyn RepairCommand>,
}

impl RegistrationOrchestrator {
    pub fn new(detector: RegistrationDetector, is_elevated: bool, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            detector,
            is_elevated,
            audit,
            repair: Box::new(Regsvr32),
        }
    }

    /// Replace the repair tool (regsvr32 by default).
    pub fn with_repair_command(mut self, repair: Box<dyn RepairCommand>) -> Self {
        self.repair = repair;
        self
    }

    pub fn detector(&self) -> &RegistrationDetector {
        &self.detector
    }

    pub fn is_elevated(&self) -> bool {
        self.is_elevated
    }

    /// Run one repair attempt.
    ///
    /// Returns an error only when `options` are invalid; every other outcome
    /// is reported through the attempt. The mode is `Automatic` when
    /// `--auto-register` was given, `Manual` otherwise.
    pub async fn register(&self, options: &RegistrationOptions) -> Result<RegistrationAttempt> {
        let mode = if options.auto_register() {
            RegistrationMode::Automatic
        } else {
            RegistrationMode::Manual
        };
        self.register_as(options, mode).await
    }

    /// Resolve a missing registration according to `args`.
    ///
    /// Returns whether the access point is usable afterwards.
    pub async fn handle_missing_registration<S: AsRef<str>>(
        &self,
        args: &[S],
        prompt: &dyn RegistrationPrompt,
    ) -> Result<bool> {
        let options = RegistrationOptions::from_args(args)?;

        if options.no_register() {
            info!("Access point is not usable and repair is disabled");
            return Ok(false);
        }

        if options.auto_register() {
            let attempt = self.register_as(&options, RegistrationMode::Automatic).await?;
            prompt.report(&attempt);
            return Ok(attempt.is_success());
        }

        let status = self.detector.get_status();
        match prompt.choose(&status) {
            RepairChoice::Accept => {
                if !self.is_elevated {
                    prompt.show_elevation_guidance();
                    return Ok(false);
                }
                let attempt = self.register_as(&options, RegistrationMode::Interactive).await?;
                prompt.report(&attempt);
                Ok(attempt.is_success())
            }
            RepairChoice::Decline => {
                let binary = self.detector.resolve_binary_path(&options, &status);
                self.record_declined(&binary, &status);
                prompt.show_manual_instructions(&binary);
                Ok(false)
            }
            RepairChoice::Quit => {
                let binary = self.detector.resolve_binary_path(&options, &status);
                self.record_declined(&binary, &status);
                Ok(false)
            }
        }
    }

    /// Check the access point and repair it per `args` when it is not usable.
    pub async fn ensure_usable<S: AsRef<str>>(
        &self,
        args: &[S],
        prompt: &dyn RegistrationPrompt,
    ) -> Result<bool> {
        if self.detector.get_status().is_usable {
            return Ok(true);
        }
        self.handle_missing_registration(args, prompt).await
    }

    async fn register_as(
        &self,
        options: &RegistrationOptions,
        mode: RegistrationMode,
    ) -> Result<RegistrationAttempt> {
        options.validate()?;

        let started = Instant::now();
        let status = self.detector.get_status();
        let binary = self.detector.resolve_binary_path(options, &status);
        let mut draft = AttemptDraft::new(mode, self.is_elevated, &binary, self.repair.method());

        if status.is_usable {
            info!("Access point already usable, nothing to repair");
            draft.outcome = RegistrationOutcome::Success;
            draft.post_validation = ValidationState::Valid;
            return Ok(self.finish(draft, started));
        }

        draft.post_validation = status.validation_state;

        if !binary.is_file() {
            warn!("Repair binary not found: {}", binary.display());
            draft.outcome = RegistrationOutcome::BinaryNotFound;
            draft.error_message = Some(format!("binary not found: {}", binary.display()));
            return Ok(self.finish(draft, started));
        }

        if !self.is_elevated {
            warn!("Repair requires elevation; not spawning {}", self.repair.method());
            draft.outcome = RegistrationOutcome::InsufficientPrivileges;
            draft.error_message = Some("administrator privileges are required".to_string());
            return Ok(self.finish(draft, started));
        }

        let invocation = self.repair.invocation(&binary, options.silent());
        info!(
            "Repairing registration with {} ({}s timeout)",
            self.repair.method(),
            options.timeout_seconds()
        );

        match run_repair(&invocation, options.timeout()).await {
            Err(e) => {
                warn!("Could not start repair: {}", e);
                draft.outcome = RegistrationOutcome::Failed;
                draft.error_message = Some(e.to_string());
            }
            Ok(output) => match output.exit {
                RepairExit::TimedOut => {
                    draft.outcome = RegistrationOutcome::Timeout;
                    draft.error_message = Some(format!(
                        "{} did not finish within {}s",
                        self.repair.method(),
                        options.timeout_seconds()
                    ));
                }
                RepairExit::Exited(code) => {
                    draft.exit_code = code;
                    if code == Some(0) {
                        draft.outcome = RegistrationOutcome::Success;
                    } else {
                        draft.outcome = RegistrationOutcome::Failed;
                        draft.error_message = Some(if output.stderr.trim().is_empty() {
                            match code {
                                Some(code) => format!("exit code {}", code),
                                None => "terminated by a signal".to_string(),
                            }
                        } else {
                            output.stderr.trim().to_string()
                        });
                    }
                }
            },
        }

        draft.post_validation = self.detector.validate_component(self.detector.clsid());
        if draft.outcome == RegistrationOutcome::Success
            && draft.post_validation != ValidationState::Valid
        {
            draft.outcome = RegistrationOutcome::ValidationFailed;
            draft.error_message = Some(format!(
                "repair exited cleanly but validation reported {:?}",
                draft.post_validation
            ));
        }

        Ok(self.finish(draft, started))
    }

    fn record_declined(&self, binary: &Path, status: &RegistrationStatus) {
        let mut draft = AttemptDraft::new(
            RegistrationMode::Declined,
            self.is_elevated,
            binary,
            self.repair.method(),
        );
        draft.outcome = RegistrationOutcome::Cancelled;
        draft.post_validation = status.validation_state;
        let attempt = draft.into_attempt(0);
        self.audit.record(&attempt);
    }

    fn finish(&self, draft: AttemptDraft, started: Instant) -> RegistrationAttempt {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let attempt = draft.into_attempt(duration_ms);
        info!(
            "Registration attempt {} finished: {:?} in {}ms",
            attempt.id, attempt.outcome, attempt.duration_ms
        );
        self.audit.record(&attempt);
        attempt
    }
}

/// Mutable staging area for an attempt; frozen by `into_attempt`.
struct AttemptDraft {
    mode: RegistrationMode,
    is_elevated: bool,
    binary_path: PathBuf,
    method: String,
    outcome: RegistrationOutcome,
    exit_code: Option<i32>,
    error_message: Option<String>,
    post_validation: ValidationState,
}

impl AttemptDraft {
    fn new(mode: RegistrationMode, is_elevated: bool, binary: &Path, method: &str) -> Self {
        Self {
            mode,
            is_elevated,
            binary_path: binary.to_path_buf(),
            method: method.to_string(),
            outcome: RegistrationOutcome::Failed,
            exit_code: None,
            error_message: None,
            post_validation: ValidationState::NotChecked,
        }
    }

    fn into_attempt(self, duration_ms: u64) -> RegistrationAttempt {
        RegistrationAttempt {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            mode: self.mode,
            user: current_user(),
            is_elevated: self.is_elevated,
            binary_path: self.binary_path.display().to_string(),
            method: self.method,
            outcome: self.outcome,
            exit_code: self.exit_code,
            error_message: self.error_message,
            duration_ms,
            post_validation: self.post_validation,
        }
    }
}
