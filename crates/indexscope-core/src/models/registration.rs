//! Registration state of the search manager access point.

use crate::config::RegistrationConfig;
use crate::error::{IndexScopeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Outcome of validating the access point by instantiating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationState {
    NotChecked,
    Valid,
    AccessPointNotFound,
    InstantiationFailed,
    NativeError,
    UnknownError,
}

/// Snapshot produced by every detection call. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStatus {
    pub is_usable: bool,
    pub access_point_exists: bool,
    pub binary_path: Option<String>,
    pub binary_exists: bool,
    pub validation_state: ValidationState,
    pub checked_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl RegistrationStatus {
    /// A status with nothing found yet.
    pub fn unchecked() -> Self {
        Self {
            is_usable: false,
            access_point_exists: false,
            binary_path: None,
            binary_exists: false,
            validation_state: ValidationState::NotChecked,
            checked_at: Utc::now(),
            error_message: None,
        }
    }

    /// Recompute `is_usable` from the other fields.
    pub(crate) fn finalize(mut self) -> Self {
        self.is_usable = self.access_point_exists
            && self.binary_exists
            && self.validation_state == ValidationState::Valid;
        self
    }
}

/// How a repair attempt was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationMode {
    Interactive,
    Automatic,
    Manual,
    Declined,
}

/// Final outcome of a repair attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationOutcome {
    Success,
    Failed,
    Timeout,
    InsufficientPrivileges,
    BinaryNotFound,
    Cancelled,
    ValidationFailed,
}

/// Record of one repair attempt. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationAttempt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub mode: RegistrationMode,
    pub user: String,
    pub is_elevated: bool,
    pub binary_path: String,
    pub method: String,
    pub outcome: RegistrationOutcome,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub post_validation: ValidationState,
}

impl RegistrationAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome == RegistrationOutcome::Success
    }
}

/// Options controlling how a missing access point is repaired.
///
/// Built through [`RegistrationOptions::builder`] or
/// [`RegistrationOptions::from_args`]; both reject invalid combinations before
/// any repair work starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOptions {
    auto_register: bool,
    no_register: bool,
    silent: bool,
    timeout_seconds: u32,
    binary_path_override: Option<PathBuf>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            auto_register: false,
            no_register: false,
            silent: false,
            timeout_seconds: RegistrationConfig::DEFAULT_TIMEOUT_SECS,
            binary_path_override: None,
        }
    }
}

impl RegistrationOptions {
    pub fn builder() -> RegistrationOptionsBuilder {
        RegistrationOptionsBuilder::default()
    }

    /// Parse repair-mode flags out of raw command-line arguments.
    ///
    /// Unrelated arguments are ignored so the full argv of a command can be
    /// passed through unchanged.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut builder = Self::builder();
        let mut iter = args.iter().map(AsRef::as_ref);
        while let Some(arg) = iter.next() {
            let (flag, inline_value) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg, None),
            };
            match flag {
                RegistrationConfig::FLAG_AUTO_REGISTER => builder = builder.auto_register(true),
                RegistrationConfig::FLAG_NO_REGISTER => builder = builder.no_register(true),
                RegistrationConfig::FLAG_SILENT => builder = builder.silent(true),
                RegistrationConfig::FLAG_TIMEOUT => {
                    let raw = inline_value
                        .or_else(|| iter.next())
                        .ok_or_else(|| IndexScopeError::validation("timeout", "missing value"))?;
                    let secs = raw.parse::<u32>().map_err(|_| {
                        IndexScopeError::validation("timeout", format!("not a number: {}", raw))
                    })?;
                    builder = builder.timeout_seconds(secs);
                }
                RegistrationConfig::FLAG_BINARY_PATH => {
                    let raw = inline_value.or_else(|| iter.next()).ok_or_else(|| {
                        IndexScopeError::validation("binary_path", "missing value")
                    })?;
                    builder = builder.binary_path_override(raw);
                }
                _ => {}
            }
        }
        builder.build()
    }

    /// Re-check the invariants. Used again right before a repair runs since
    /// the override binary may have disappeared since construction.
    pub fn validate(&self) -> Result<()> {
        if self.auto_register && self.no_register {
            return Err(IndexScopeError::validation(
                "auto_register",
                "auto-register and no-register are mutually exclusive",
            ));
        }
        let range = RegistrationConfig::MIN_TIMEOUT_SECS..=RegistrationConfig::MAX_TIMEOUT_SECS;
        if !range.contains(&self.timeout_seconds) {
            return Err(IndexScopeError::validation(
                "timeout_seconds",
                format!(
                    "{} is outside {}..={}",
                    self.timeout_seconds,
                    RegistrationConfig::MIN_TIMEOUT_SECS,
                    RegistrationConfig::MAX_TIMEOUT_SECS
                ),
            ));
        }
        if let Some(path) = &self.binary_path_override {
            if !path.is_file() {
                return Err(IndexScopeError::validation(
                    "binary_path_override",
                    format!("file does not exist: {}", path.display()),
                ));
            }
        }
        Ok(())
    }

    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    pub fn no_register(&self) -> bool {
        self.no_register
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_seconds))
    }

    pub fn binary_path_override(&self) -> Option<&Path> {
        self.binary_path_override.as_deref()
    }
}

/// Builder for [`RegistrationOptions`].
#[derive(Debug, Default)]
pub struct RegistrationOptionsBuilder {
    options: RegistrationOptions,
}

impl RegistrationOptionsBuilder {
    pub fn auto_register(mut self, value: bool) -> Self {
        self.options.auto_register = value;
        self
    }

    pub fn no_register(mut self, value: bool) -> Self {
        self.options.no_register = value;
        self
    }

    pub fn silent(mut self, value: bool) -> Self {
        self.options.silent = value;
        self
    }

    pub fn timeout_seconds(mut self, secs: u32) -> Self {
        self.options.timeout_seconds = secs;
        self
    }

    pub fn binary_path_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.binary_path_override = Some(path.into());
        self
    }

    /// Validate and build the options.
    pub fn build(self) -> Result<RegistrationOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
