//! Rule and extension CRUD against the native indexing subsystem.
//!
//! Every public method checks that the indexing service is running before it
//! touches a native port, and fails with `ServiceUnavailable` otherwise.
//!
//! A domain rule maps onto several native scope rules:
//! - the rule itself (`path`, include/exclude, recursive)
//! - one rule per file-type filter (`path\pattern`)
//! - one exclude rule per excluded subfolder (`path\subfolder`)
//!
//! Listing folds these children back: wildcard children become filters, and
//! direct exclude children of a user include rule become excluded subfolders.
//! Removing a rule removes the children listing would fold into it. There is
//! no locking: concurrent writers are serialized only by the native subsystem.

use super::wildcard::{has_wildcards, WildcardPattern};
use crate::error::{IndexScopeError, NativeFault, Result};
use crate::models::{
    normalize_extension, FileExtensionSetting, FileTypeFilter, FilterType, IndexRule,
    IndexingDepth, RuleSource, RuleType,
};
use crate::native::{CrawlScopeProvider, ExtensionStore, IndexingService, NativeScopeRule};
use crate::platform::normalize_scope_path;
use crate::platform::paths::{join_segment, paths_equal, split_last_segment};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct IndexRuleManager {
    provider: Arc<dyn CrawlScopeProvider>,
    extensions: Arc<dyn ExtensionStore>,
    service: Arc<dyn IndexingService>,
}

impl IndexRuleManager {
    pub fn new(
        provider: Arc<dyn CrawlScopeProvider>,
        extensions: Arc<dyn ExtensionStore>,
        service: Arc<dyn IndexingService>,
    ) -> Self {
        Self {
            provider,
            extensions,
            service,
        }
    }

    // ========================================
    // Scope rules
    // ========================================

    /// List scope rules, with system defaults only when `include_system` is set.
    pub fn list_rules(&self, include_system: bool) -> Result<Vec<IndexRule>> {
        self.ensure_service()?;
        let native = self.provider.enumerate_rules(true)?;
        let mut rules = fold_native_rules(&native);
        if !include_system {
            rules.retain(|rule| !rule.is_system());
        }
        debug!("Listed {} scope rules (system: {})", rules.len(), include_system);
        Ok(rules)
    }

    /// Add a rule. Fails with `Conflict` when any rule, system ones included,
    /// already exists for the same path ignoring case.
    pub fn add_rule(&self, rule: &IndexRule) -> Result<IndexRule> {
        self.ensure_service()?;
        let rule = prepare_rule(rule)?;

        let existing = self.provider.enumerate_rules(true)?;
        if existing.iter().any(|native| paths_equal(&native.path, &rule.path)) {
            return Err(IndexScopeError::Conflict { path: rule.path });
        }

        let mut secondary = Vec::new();
        for (path, included) in secondary_rules(&rule) {
            match existing.iter().find(|native| paths_equal(&native.path, &path)) {
                Some(native) if native.is_included != included => {
                    return Err(IndexScopeError::Conflict { path });
                }
                Some(_) => debug!("Secondary rule {} already present", path),
                None => secondary.push((path, included)),
            }
        }

        self.submit(&rule, &secondary)?;
        info!(
            "Added {:?} rule for {} ({} filters)",
            rule.rule_type,
            rule.path,
            rule.file_type_filters.len()
        );
        Ok(rule)
    }

    /// Remove the rule for `path` together with its filter and subfolder rules.
    pub fn remove_rule(&self, path: &str) -> Result<()> {
        self.ensure_service()?;
        let path = normalize_scope_path(path)?;

        let children = match self.provider.enumerate_rules(true) {
            Ok(native) => folded_children(&native, &path),
            Err(e) => {
                debug!("Could not enumerate filter rules under {}: {}", path, e);
                Vec::new()
            }
        };

        self.provider
            .remove_rule(&path)
            .map_err(|fault| IndexScopeError::from_native(fault, &path))?;

        for child in children {
            if let Err(fault) = self.provider.remove_rule(&child) {
                warn!("Left child rule {} behind: {}", child, fault);
            }
        }
        info!("Removed rule for {}", path);
        Ok(())
    }

    /// Replace the rule at `rule.path` with `rule`.
    ///
    /// This is a remove followed by an add, as two native calls. If the add
    /// fails the old rule is already gone and the caller has to re-add it;
    /// the add error is returned unchanged.
    pub fn modify_rule(&self, rule: &IndexRule) -> Result<IndexRule> {
        self.ensure_service()?;
        let prepared = prepare_rule(rule)?;

        let existing = self.provider.enumerate_rules(true)?;
        if !existing.iter().any(|native| paths_equal(&native.path, &prepared.path)) {
            return Err(IndexScopeError::NotFound {
                what: format!("rule for {}", prepared.path),
            });
        }

        self.remove_rule(&prepared.path)?;
        match self.add_rule(&prepared) {
            Ok(added) => Ok(added),
            Err(e) => {
                error!(
                    "Rule for {} was removed but could not be re-added: {}",
                    prepared.path, e
                );
                Err(e)
            }
        }
    }

    // ========================================
    // Extension depth
    // ========================================

    pub fn list_extensions(&self) -> Result<Vec<FileExtensionSetting>> {
        self.ensure_service()?;
        let now = Utc::now();
        let settings = self
            .extensions
            .list()?
            .into_iter()
            .filter_map(|stored| match IndexingDepth::from_stored(stored.value) {
                Some(depth) => Some(FileExtensionSetting {
                    extension: stored.extension,
                    indexing_depth: depth,
                    is_default_setting: stored.is_default,
                    modified_at: now,
                }),
                None => {
                    warn!(
                        "Skipping {} with unknown depth value {}",
                        stored.extension, stored.value
                    );
                    None
                }
            })
            .collect();
        Ok(settings)
    }

    pub fn get_extension(&self, extension: &str) -> Result<FileExtensionSetting> {
        self.ensure_service()?;
        let extension = normalize_extension(extension)?;
        let not_found = || IndexScopeError::NotFound {
            what: format!("extension {}", extension),
        };
        let stored = self.extensions.read(&extension)?.ok_or_else(not_found)?;
        let depth = IndexingDepth::from_stored(stored.value).ok_or_else(|| {
            IndexScopeError::Other(format!(
                "{} has unknown depth value {}",
                extension, stored.value
            ))
        })?;
        Ok(FileExtensionSetting {
            extension: stored.extension,
            indexing_depth: depth,
            is_default_setting: stored.is_default,
            modified_at: Utc::now(),
        })
    }

    /// Settings whose extension matches a `*`/`?` pattern, ignoring case.
    pub fn search_extensions(&self, pattern: &str) -> Result<Vec<FileExtensionSetting>> {
        let matcher = WildcardPattern::new(pattern)?;
        let mut matches: Vec<_> = self
            .list_extensions()?
            .into_iter()
            .filter(|setting| matcher.is_match(&setting.extension))
            .collect();
        matches.sort_by(|a, b| a.extension.cmp(&b.extension));
        debug!("{} extensions match {:?}", matches.len(), matcher.as_str());
        Ok(matches)
    }

    /// Store the depth for `extension`; `txt` and `.txt` name the same entry.
    ///
    /// Elevation is the caller's concern.
    pub fn set_extension_depth(
        &self,
        extension: &str,
        depth: IndexingDepth,
    ) -> Result<FileExtensionSetting> {
        self.ensure_service()?;
        let extension = normalize_extension(extension)?;
        self.extensions
            .write(&extension, depth.as_stored())
            .map_err(|fault| match fault {
                NativeFault::NotFound => IndexScopeError::NotFound {
                    what: format!("extension {}", extension),
                },
                other => other.into(),
            })?;
        info!("Set {} to {}", extension, depth);
        Ok(FileExtensionSetting {
            extension,
            indexing_depth: depth,
            is_default_setting: false,
            modified_at: Utc::now(),
        })
    }

    fn ensure_service(&self) -> Result<()> {
        if self.service.is_running() {
            Ok(())
        } else {
            Err(IndexScopeError::ServiceUnavailable {
                service: self.service.name().to_string(),
            })
        }
    }

    /// Apply the main rule, then `secondary`. A failure part way through
    /// removes what this call added before returning the error.
    fn submit(&self, rule: &IndexRule, secondary: &[(String, bool)]) -> Result<()> {
        self.provider
            .add_rule(&rule.path, rule.rule_type.is_include(), rule.recursive)
            .map_err(|fault| IndexScopeError::from_native(fault, &rule.path))?;

        let mut applied = vec![rule.path.as_str()];
        for (path, included) in secondary {
            match self.provider.add_rule(path, *included, rule.recursive) {
                Ok(()) => applied.push(path.as_str()),
                Err(NativeFault::DuplicateRule) => {
                    debug!("Secondary rule {} appeared concurrently", path);
                }
                Err(fault) => {
                    self.roll_back(&applied);
                    return Err(IndexScopeError::from_native(fault, path));
                }
            }
        }
        Ok(())
    }

    fn roll_back(&self, applied: &[&str]) {
        for path in applied.iter().rev() {
            match self.provider.remove_rule(path) {
                Ok(()) => debug!("Rolled back {}", path),
                Err(fault) => warn!("Could not roll back {}: {}", path, fault),
            }
        }
    }
}

/// Native child rules a domain rule expands to, as `(path, included)`.
fn secondary_rules(rule: &IndexRule) -> Vec<(String, bool)> {
    rule.file_type_filters
        .iter()
        .map(|filter| {
            (
                join_segment(&rule.path, &filter.pattern),
                filter.filter_type == FilterType::Include,
            )
        })
        .chain(
            rule.excluded_subfolders
                .iter()
                .map(|subfolder| (join_segment(&rule.path, subfolder), false)),
        )
        .collect()
}

/// Normalize a caller-supplied rule and check its filters.
fn prepare_rule(rule: &IndexRule) -> Result<IndexRule> {
    let mut prepared = rule.clone();
    prepared.path = normalize_scope_path(&rule.path)?;
    for filter in &prepared.file_type_filters {
        let pattern = filter.pattern.trim();
        if pattern.is_empty() || pattern.contains(['\\', '/']) {
            return Err(IndexScopeError::validation(
                "fileTypeFilters",
                format!("invalid filter pattern {:?}", filter.pattern),
            ));
        }
    }
    for subfolder in &prepared.excluded_subfolders {
        let name = subfolder.trim_matches(['\\', '/']).trim();
        if name.is_empty() || name.contains(['\\', '/']) || has_wildcards(subfolder) {
            return Err(IndexScopeError::validation(
                "excludedSubfolders",
                format!("invalid subfolder {:?}", subfolder),
            ));
        }
    }
    let children = secondary_rules(&prepared);
    for (index, (path, included)) in children.iter().enumerate() {
        if children[..index]
            .iter()
            .any(|(other, other_included)| paths_equal(other, path) && other_included != included)
        {
            return Err(IndexScopeError::validation(
                "fileTypeFilters",
                format!("{} is both included and excluded", path),
            ));
        }
    }
    prepared.modified_at = Utc::now();
    Ok(prepared)
}

/// How a native child rule folds into its parent domain rule.
enum Fold {
    Filter(FileTypeFilter),
    Subfolder(String),
}

/// Classify `child` against `parent`, or `None` when it stands on its own.
///
/// Wildcard children of any rule are filters. A non-wildcard direct child is
/// an excluded subfolder only when it is a user exclude under a user include.
fn fold_into(child: &NativeScopeRule, parent: &NativeScopeRule) -> Option<Fold> {
    let (child_parent, segment) = split_last_segment(&child.path)?;
    if !paths_equal(child_parent, &parent.path) {
        return None;
    }
    if has_wildcards(segment) {
        return Some(Fold::Filter(FileTypeFilter::from_pattern(segment, child.is_included)));
    }
    let subfolder = parent.is_included && !parent.is_default && !child.is_included && !child.is_default;
    subfolder.then(|| Fold::Subfolder(segment.to_string()))
}

/// Child paths that `list_rules` folds into the rule at `parent`.
fn folded_children(native: &[NativeScopeRule], parent: &str) -> Vec<String> {
    let Some(parent) = native.iter().find(|rule| paths_equal(&rule.path, parent)) else {
        return Vec::new();
    };
    native
        .iter()
        .filter(|child| fold_into(child, parent).is_some())
        .map(|child| child.path.clone())
        .collect()
}

/// Map native rules onto domain rules, folding children into their parents.
fn fold_native_rules(native: &[NativeScopeRule]) -> Vec<IndexRule> {
    // Subfolder excludes first, so nothing folds into a rule that is itself folded away
    let subfolders: Vec<&str> = native
        .iter()
        .filter(|child| {
            native
                .iter()
                .any(|parent| matches!(fold_into(child, parent), Some(Fold::Subfolder(_))))
        })
        .map(|child| child.path.as_str())
        .collect();
    let is_subfolder = |path: &str| subfolders.iter().any(|folded| paths_equal(folded, path));

    let mut rules: Vec<IndexRule> = Vec::new();
    let mut folds: Vec<(String, Fold)> = Vec::new();

    for entry in native {
        if is_subfolder(&entry.path) {
            if let Some((parent, segment)) = split_last_segment(&entry.path) {
                folds.push((parent.to_string(), Fold::Subfolder(segment.to_string())));
            }
            continue;
        }
        let filter = native
            .iter()
            .filter(|parent| !is_subfolder(&parent.path))
            .find_map(|parent| match fold_into(entry, parent)? {
                Fold::Filter(filter) => Some((parent.path.clone(), filter)),
                Fold::Subfolder(_) => None,
            });
        if let Some((parent, filter)) = filter {
            folds.push((parent, Fold::Filter(filter)));
            continue;
        }

        let mut rule = IndexRule::new(entry.path.clone(), RuleType::from_included(entry.is_included));
        if entry.is_default {
            rule.source = RuleSource::System;
            rule.is_user_defined = false;
        }
        rules.push(rule);
    }

    for (parent, fold) in folds {
        if let Some(rule) = rules.iter_mut().find(|rule| paths_equal(&rule.path, &parent)) {
            match fold {
                Fold::Filter(filter) => rule.file_type_filters.push(filter),
                Fold::Subfolder(name) => rule.excluded_subfolders.push(name),
            }
        }
    }
    rules
}
