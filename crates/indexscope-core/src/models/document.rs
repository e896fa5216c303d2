//! Portable configuration document and the results of applying it.

use super::{FileExtensionSetting, IndexRule};
use crate::config::DocumentConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Full rule set and extension settings as exported to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDocument {
    pub version: String,
    #[serde(rename = "exportDate")]
    pub exported_at: DateTime<Utc>,
    pub exported_by: String,
    #[serde(rename = "machineName")]
    pub machine_id: String,
    #[serde(default)]
    pub rules: Vec<IndexRule>,
    #[serde(default)]
    pub extension_settings: Vec<FileExtensionSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ConfigurationDocument {
    /// Create a document stamped with the current time and the given identity.
    pub fn new(
        exported_by: impl Into<String>,
        machine_id: impl Into<String>,
        rules: Vec<IndexRule>,
        extension_settings: Vec<FileExtensionSetting>,
    ) -> Self {
        Self {
            version: DocumentConfig::SUPPORTED_VERSION.to_string(),
            exported_at: Utc::now(),
            exported_by: exported_by.into(),
            machine_id: machine_id.into(),
            rules,
            extension_settings,
            checksum: None,
        }
    }

    /// SHA-256 over the canonical JSON of the payload (rules + extensions).
    pub fn compute_checksum(&self) -> String {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload<'a> {
            rules: &'a [IndexRule],
            extension_settings: &'a [FileExtensionSetting],
        }

        let payload = Payload {
            rules: &self.rules,
            extension_settings: &self.extension_settings,
        };
        // Serializing plain structs and vectors cannot fail.
        let bytes = serde_json::to_vec(&payload).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    pub fn with_checksum(mut self) -> Self {
        self.checksum = Some(self.compute_checksum());
        self
    }

    /// `None` when the document carries no checksum.
    pub fn checksum_matches(&self) -> Option<bool> {
        self.checksum
            .as_ref()
            .map(|stored| stored.eq_ignore_ascii_case(&self.compute_checksum()))
    }

    pub fn is_supported_version(&self) -> bool {
        self.version == DocumentConfig::SUPPORTED_VERSION
    }
}

/// Accumulated outcome of one import call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub rules_imported: usize,
    pub rules_failed: usize,
    pub extensions_imported: usize,
    pub extensions_failed: usize,
    /// System rules and default extension settings left untouched.
    #[serde(default)]
    pub rules_skipped: usize,
    #[serde(default)]
    pub extensions_skipped: usize,
    pub errors: Vec<String>,
    /// Reason the import stopped early (fail-fast mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl ImportResult {
    /// True when every item applied and nothing aborted.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.rules_failed == 0 && self.extensions_failed == 0
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }
}

/// Outcome of validating a document without applying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// All violations joined into one message; empty when valid.
    pub message: String,
    pub violations: Vec<String>,
    pub rule_count: usize,
    pub extension_count: usize,
}

impl ValidationResult {
    pub(crate) fn from_violations(
        violations: Vec<String>,
        rule_count: usize,
        extension_count: usize,
    ) -> Self {
        Self {
            is_valid: violations.is_empty(),
            message: violations.join("; "),
            violations,
            rule_count,
            extension_count,
        }
    }
}
