//! Per-extension indexing depth.

use crate::error::{IndexScopeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much of a file is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexingDepth {
    NotIndexed,
    PropertiesOnly,
    PropertiesAndContents,
}

impl IndexingDepth {
    /// Value stored in the native key-value store.
    pub fn as_stored(self) -> u32 {
        match self {
            IndexingDepth::NotIndexed => 0,
            IndexingDepth::PropertiesOnly => 1,
            IndexingDepth::PropertiesAndContents => 2,
        }
    }

    pub fn from_stored(value: u32) -> Option<Self> {
        match value {
            0 => Some(IndexingDepth::NotIndexed),
            1 => Some(IndexingDepth::PropertiesOnly),
            2 => Some(IndexingDepth::PropertiesAndContents),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexingDepth::NotIndexed => "notIndexed",
            IndexingDepth::PropertiesOnly => "propertiesOnly",
            IndexingDepth::PropertiesAndContents => "propertiesAndContents",
        }
    }

    /// Parse a depth name, accepting camelCase, kebab-case and the stored digit.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "notindexed" | "none" | "0" => Some(IndexingDepth::NotIndexed),
            "propertiesonly" | "properties" | "1" => Some(IndexingDepth::PropertiesOnly),
            "propertiesandcontents" | "contents" | "2" => Some(IndexingDepth::PropertiesAndContents),
            _ => None,
        }
    }
}

impl std::fmt::Display for IndexingDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Indexing depth configured for one file extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExtensionSetting {
    pub extension: String,
    pub indexing_depth: IndexingDepth,
    /// System-provided settings are read-only.
    #[serde(default)]
    pub is_default_setting: bool,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

/// Normalize an extension to its dot-prefixed, lower-case form.
///
/// `"txt"`, `".txt"` and `".TXT"` all become `".txt"`.
pub fn normalize_extension(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if body.is_empty() {
        return Err(IndexScopeError::validation("extension", "extension must not be empty"));
    }
    if body.contains(['.', '\\', '/', '*', '?']) || body.chars().any(char::is_whitespace) {
        return Err(IndexScopeError::validation(
            "extension",
            format!("invalid extension: {}", raw),
        ));
    }
    Ok(format!(".{}", body.to_lowercase()))
}
