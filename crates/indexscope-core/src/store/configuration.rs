//! Export, import and validation of portable configuration documents.
//!
//! Import is not transactional. A fail-fast abort leaves whatever was applied
//! before it in place, and the returned [`ImportResult`] says how far it got.

use super::atomic;
use crate::config::DocumentConfig;
use crate::error::{IndexScopeError, Result};
use crate::models::{ConfigurationDocument, ImportResult, ValidationResult};
use crate::platform::{current_user, machine_name, normalize_scope_path, paths_equal};
use crate::rules::IndexRuleManager;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ConfigurationStore {
    rules: Arc<IndexRuleManager>,
    exported_by: String,
    machine: String,
    keep_backup: bool,
}

impl ConfigurationStore {
    /// Create a store that stamps exports with the current user and host.
    pub fn new(rules: Arc<IndexRuleManager>) -> Self {
        Self {
            rules,
            exported_by: current_user(),
            machine: machine_name(),
            keep_backup: DocumentConfig::KEEP_BACKUP_ON_EXPORT,
        }
    }

    pub fn with_identity(mut self, exported_by: impl Into<String>, machine: impl Into<String>) -> Self {
        self.exported_by = exported_by.into();
        self.machine = machine.into();
        self
    }

    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    /// Write the current rules (and optionally extension settings) to `path`.
    pub fn export(
        &self,
        path: &Path,
        include_defaults: bool,
        include_extensions: bool,
    ) -> Result<ConfigurationDocument> {
        let rules = self.rules.list_rules(include_defaults)?;
        let extensions = if include_extensions {
            self.rules.list_extensions()?
        } else {
            Vec::new()
        };

        let document =
            ConfigurationDocument::new(&self.exported_by, &self.machine, rules, extensions)
                .with_checksum();
        atomic::write_json(path, &document, self.keep_backup)?;

        info!(
            "Exported {} rules and {} extension settings to {}",
            document.rules.len(),
            document.extension_settings.len(),
            path.display()
        );
        Ok(document)
    }

    /// Apply the document at `path`.
    ///
    /// With `merge == false` every user rule is removed first. With
    /// `continue_on_error` failures are collected; otherwise the first one
    /// stops the import and is reported in `ImportResult::aborted`. Rules
    /// exported from the system defaults and default extension settings are
    /// skipped.
    pub fn import(&self, path: &Path, merge: bool, continue_on_error: bool) -> Result<ImportResult> {
        let document = load(path)?;
        if !document.is_supported_version() {
            return Err(IndexScopeError::UnsupportedVersion {
                found: document.version,
                expected: DocumentConfig::SUPPORTED_VERSION.to_string(),
            });
        }
        if document.checksum_matches() == Some(false) {
            warn!(
                "Checksum of {} does not match its contents; importing anyway",
                path.display()
            );
        }

        let mut result = ImportResult::default();

        if !merge {
            for rule in self.rules.list_rules(false)? {
                if let Err(e) = self.rules.remove_rule(&rule.path) {
                    let message = format!("Failed to remove existing rule {}: {}", rule.path, e);
                    warn!("{}", message);
                    result.record_error(message.clone());
                    if !continue_on_error {
                        result.aborted = Some(message);
                        return Ok(result);
                    }
                }
            }
        }

        for rule in document.rules {
            if rule.is_system() {
                debug!("Skipping system rule {}", rule.path);
                result.rules_skipped += 1;
                continue;
            }
            let rule_path = rule.path.clone();
            match self.rules.add_rule(&rule.into_imported()) {
                Ok(_) => result.rules_imported += 1,
                Err(e) => {
                    result.rules_failed += 1;
                    let message = format!("Rule {}: {}", rule_path, e);
                    warn!("Import failed for {}", message);
                    result.record_error(message.clone());
                    if !continue_on_error {
                        result.aborted = Some(message);
                        return Ok(result);
                    }
                }
            }
        }

        for setting in document.extension_settings {
            if setting.is_default_setting {
                debug!("Skipping default setting for {}", setting.extension);
                result.extensions_skipped += 1;
                continue;
            }
            match self
                .rules
                .set_extension_depth(&setting.extension, setting.indexing_depth)
            {
                Ok(_) => result.extensions_imported += 1,
                Err(e) => {
                    result.extensions_failed += 1;
                    let message = format!("Extension {}: {}", setting.extension, e);
                    warn!("Import failed for {}", message);
                    result.record_error(message.clone());
                    if !continue_on_error {
                        result.aborted = Some(message);
                        return Ok(result);
                    }
                }
            }
        }

        info!(
            "Imported {} rules ({} failed) and {} extensions ({} failed) from {}",
            result.rules_imported,
            result.rules_failed,
            result.extensions_imported,
            result.extensions_failed,
            path.display()
        );
        Ok(result)
    }

    /// Check the document at `path` without applying anything.
    pub fn validate(&self, path: &Path) -> Result<ValidationResult> {
        validate_file(path)
    }
}

/// Check the document at `path` without a live indexing backend.
///
/// Only I/O failures are errors. A document that does not parse is
/// reported as an invalid result.
pub fn validate_file(path: &Path) -> Result<ValidationResult> {
    let contents = fs::read_to_string(path).map_err(|e| IndexScopeError::io_with_path(e, path))?;
    let document: ConfigurationDocument = match serde_json::from_str(&contents) {
        Ok(document) => document,
        Err(e) => {
            return Ok(ValidationResult::from_violations(
                vec![format!("Document could not be parsed: {}", e)],
                0,
                0,
            ))
        }
    };

    let violations = validate_document(&document);
    debug!("{} has {} violations", path.display(), violations.len());
    Ok(ValidationResult::from_violations(
        violations,
        document.rules.len(),
        document.extension_settings.len(),
    ))
}

/// Every problem with `document`, in document order.
pub fn validate_document(document: &ConfigurationDocument) -> Vec<String> {
    let mut violations = Vec::new();

    if !document.is_supported_version() {
        violations.push(format!(
            "Unsupported version {:?} (expected {:?})",
            document.version,
            DocumentConfig::SUPPORTED_VERSION
        ));
    }

    for (index, rule) in document.rules.iter().enumerate() {
        if rule.path.trim().is_empty() {
            violations.push(format!("Rule {}: path is empty", index + 1));
            continue;
        }
        if let Err(e) = normalize_scope_path(&rule.path) {
            violations.push(format!("Rule {} ({}): {}", index + 1, rule.path, e));
        }
        let duplicate = document.rules[..index]
            .iter()
            .any(|earlier| paths_equal(earlier.path.trim(), rule.path.trim()));
        if duplicate {
            violations.push(format!("Rule {} ({}): duplicate path", index + 1, rule.path));
        }
    }

    for (index, setting) in document.extension_settings.iter().enumerate() {
        let body = setting.extension.strip_prefix('.');
        match body {
            None => violations.push(format!(
                "Extension {} ({:?}): must start with '.'",
                index + 1,
                setting.extension
            )),
            Some(body) if body.is_empty() || body.contains(['.', '\\', '/', '*', '?']) => {
                violations.push(format!(
                    "Extension {} ({:?}): invalid extension name",
                    index + 1,
                    setting.extension
                ))
            }
            Some(_) => {}
        }
    }

    if document.checksum_matches() == Some(false) {
        violations.push("Checksum does not match the document contents".to_string());
    }

    violations
}

fn load(path: &Path) -> Result<ConfigurationDocument> {
    atomic::read_json(path)?.ok_or_else(|| IndexScopeError::NotFound {
        what: format!("configuration document {}", path.display()),
    })
}
