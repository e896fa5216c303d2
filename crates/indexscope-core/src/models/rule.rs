//! Scope rules held by the indexing subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a rule adds or removes a path from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleType {
    Include,
    Exclude,
}

impl RuleType {
    pub fn from_included(included: bool) -> Self {
        if included {
            RuleType::Include
        } else {
            RuleType::Exclude
        }
    }

    pub fn is_include(self) -> bool {
        self == RuleType::Include
    }
}

/// Where a rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleSource {
    System,
    User,
    Imported,
}

/// Include/exclude direction of a file-type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterType {
    Include,
    Exclude,
}

/// What a filter pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterTarget {
    FileExtension,
    FileName,
    Subfolder,
}

/// A pattern refining which entries under a rule's path are indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTypeFilter {
    pub pattern: String,
    pub filter_type: FilterType,
    pub applies_to: FilterTarget,
}

impl FileTypeFilter {
    pub fn new(pattern: impl Into<String>, filter_type: FilterType, applies_to: FilterTarget) -> Self {
        Self {
            pattern: pattern.into(),
            filter_type,
            applies_to,
        }
    }

    /// Classify a wildcard pattern: `*.ext` targets the extension, anything
    /// else the file name.
    pub fn from_pattern(segment: &str, included: bool) -> Self {
        let is_extension = segment
            .strip_prefix("*.")
            .map(|rest| !rest.is_empty() && !rest.contains(['*', '?']))
            .unwrap_or(false);
        Self {
            pattern: segment.to_string(),
            filter_type: if included {
                FilterType::Include
            } else {
                FilterType::Exclude
            },
            applies_to: if is_extension {
                FilterTarget::FileExtension
            } else {
                FilterTarget::FileName
            },
        }
    }
}

/// One path-level include/exclude directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub path: String,
    pub rule_type: RuleType,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub file_type_filters: Vec<FileTypeFilter>,
    #[serde(default)]
    pub excluded_subfolders: Vec<String>,
    #[serde(default = "default_user_defined")]
    pub is_user_defined: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    #[serde(default = "default_source")]
    pub source: RuleSource,
}

fn default_recursive() -> bool {
    true
}

fn default_user_defined() -> bool {
    true
}

fn default_source() -> RuleSource {
    RuleSource::User
}

impl IndexRule {
    /// Create a user-defined rule for `path`.
    pub fn new(path: impl Into<String>, rule_type: RuleType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            rule_type,
            recursive: true,
            file_type_filters: Vec::new(),
            excluded_subfolders: Vec::new(),
            is_user_defined: true,
            created_at: now,
            modified_at: now,
            source: RuleSource::User,
        }
    }

    pub fn include(path: impl Into<String>) -> Self {
        Self::new(path, RuleType::Include)
    }

    pub fn exclude(path: impl Into<String>) -> Self {
        Self::new(path, RuleType::Exclude)
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_filter(mut self, filter: FileTypeFilter) -> Self {
        self.file_type_filters.push(filter);
        self
    }

    pub fn with_excluded_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.excluded_subfolders.push(subfolder.into());
        self
    }

    /// Retag this rule as coming from an imported document.
    pub fn into_imported(mut self) -> Self {
        let now = Utc::now();
        self.source = RuleSource::Imported;
        self.is_user_defined = true;
        self.created_at = now;
        self.modified_at = now;
        self
    }

    pub fn is_system(&self) -> bool {
        self.source == RuleSource::System
    }

    /// Compare the parts of two rules the indexing subsystem actually stores.
    pub fn same_effect(&self, other: &IndexRule) -> bool {
        crate::platform::paths_equal(&self.path, &other.path)
            && self.rule_type == other.rule_type
            && self.recursive == other.recursive
            && self.file_type_filters == other.file_type_filters
            && self.excluded_subfolders.len() == other.excluded_subfolders.len()
            && self.excluded_subfolders.iter().all(|name| {
                other
                    .excluded_subfolders
                    .iter()
                    .any(|theirs| theirs.eq_ignore_ascii_case(name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_deserialize() {
        let rule: IndexRule =
            serde_json::from_str(r#"{"path":"C:\\Data","ruleType":"exclude"}"#).unwrap();
        assert_eq!(rule.rule_type, RuleType::Exclude);
        assert!(rule.recursive);
        assert!(rule.file_type_filters.is_empty());
        assert_eq!(rule.source, RuleSource::User);
    }

    #[test]
    fn test_enum_serialization_is_camel_case() {
        let rule = IndexRule::include(r"C:\Data").with_filter(FileTypeFilter::new(
            "*.log",
            FilterType::Exclude,
            FilterTarget::FileExtension,
        ));
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"ruleType\":\"include\""));
        assert!(json.contains("\"appliesTo\":\"fileExtension\""));
        assert!(json.contains("\"source\":\"user\""));
    }

    #[test]
    fn test_native_segment_classification() {
        let ext = FileTypeFilter::from_pattern("*.log", false);
        assert_eq!(ext.applies_to, FilterTarget::FileExtension);
        assert_eq!(ext.filter_type, FilterType::Exclude);

        let name = FileTypeFilter::from_pattern("backup-*", true);
        assert_eq!(name.applies_to, FilterTarget::FileName);
        assert_eq!(name.filter_type, FilterType::Include);
    }

    #[test]
    fn test_into_imported_retags() {
        let rule = IndexRule::include(r"C:\Data").into_imported();
        assert_eq!(rule.source, RuleSource::Imported);
        assert!(rule.is_user_defined);
    }
}
