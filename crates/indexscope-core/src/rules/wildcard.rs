//! Shell-style wildcard matching for extension and file name patterns.
//!
//! `*` matches any run of characters (including none), `?` matches exactly
//! one. Matching is case-insensitive and anchored at both ends.

use crate::error::{IndexScopeError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut translated = String::with_capacity(pattern.len() + 8);
        translated.push_str("(?is)^");
        let mut literal = String::new();
        for ch in pattern.chars() {
            match ch {
                '*' | '?' => {
                    translated.push_str(&regex::escape(&literal));
                    literal.clear();
                    translated.push_str(if ch == '*' { ".*" } else { "." });
                }
                other => literal.push(other),
            }
        }
        translated.push_str(&regex::escape(&literal));
        translated.push('$');

        let regex = Regex::new(&translated).map_err(|e| {
            IndexScopeError::validation("pattern", format!("invalid pattern {:?}: {}", pattern, e))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Whether a pattern segment contains wildcard characters.
pub fn has_wildcards(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// One-shot match of `text` against `pattern`.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    WildcardPattern::new(pattern)
        .map(|p| p.is_match(text))
        .unwrap_or(false)
}
