//! Scope path handling.
//!
//! Scope rules are Windows paths regardless of the host the library is compiled
//! on, so normalization works on strings rather than `std::path::Path`.
//! Accepted roots:
//! - drive-rooted paths (`C:\Users\me`)
//! - UNC shares (`\\server\share\dir`)

use crate::config::DocumentConfig;
use crate::error::{IndexScopeError, Result};
use regex::Regex;
use std::sync::OnceLock;

const SEPARATOR: char = '\\';
const FILE_URL_PREFIX: &str = "file:///";

/// Normalize a scope path for storage and comparison.
///
/// - trims surrounding whitespace
/// - converts `/` to `\`
/// - collapses repeated separators (keeping the UNC prefix)
/// - strips trailing separators except on a drive root (`C:\`)
/// - upper-cases the drive letter
///
/// # Errors
/// Returns a validation error when the path is empty, not rooted, or longer
/// than [`DocumentConfig::MAX_PATH_LENGTH`].
pub fn normalize_scope_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IndexScopeError::validation("path", "path must not be empty"));
    }

    let unified = trimmed.replace('/', "\\");
    let is_unc = unified.starts_with("\\\\");

    let mut normalized = String::with_capacity(unified.len());
    if is_unc {
        normalized.push_str("\\\\");
    }
    let body = if is_unc { &unified[2..] } else { &unified[..] };
    let mut previous_was_separator = false;
    for ch in body.chars() {
        if ch == SEPARATOR {
            if !previous_was_separator {
                normalized.push(ch);
            }
            previous_was_separator = true;
        } else {
            normalized.push(ch);
            previous_was_separator = false;
        }
    }

    while normalized.ends_with(SEPARATOR) && !is_drive_root(&normalized) && normalized.len() > 2 {
        normalized.pop();
    }

    if is_unc {
        let mut parts = normalized[2..].split(SEPARATOR);
        let server = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if server.is_empty() || share.is_empty() {
            return Err(IndexScopeError::validation(
                "path",
                format!("UNC path must name a server and share: {}", raw),
            ));
        }
    } else if !has_drive_prefix(&normalized) {
        return Err(IndexScopeError::validation(
            "path",
            format!("path must be absolute (drive-rooted or UNC): {}", raw),
        ));
    } else {
        let mut chars: Vec<char> = normalized.chars().collect();
        chars[0] = chars[0].to_ascii_uppercase();
        normalized = chars.into_iter().collect();
        if normalized.len() == 2 {
            normalized.push(SEPARATOR);
        }
    }

    check_path_length(&normalized)?;
    Ok(normalized)
}

/// Reject paths longer than the supported maximum.
pub fn check_path_length(path: &str) -> Result<()> {
    let length = path.chars().count();
    if length > DocumentConfig::MAX_PATH_LENGTH {
        return Err(IndexScopeError::validation(
            "path",
            format!(
                "path is {} characters long (maximum {})",
                length,
                DocumentConfig::MAX_PATH_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Case-insensitive comparison of two normalized scope paths.
pub fn paths_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Split a normalized path into its parent and final segment.
///
/// Returns `None` for roots.
pub fn split_last_segment(path: &str) -> Option<(&str, &str)> {
    let index = path.rfind(SEPARATOR)?;
    let (parent, last) = (&path[..index], &path[index + 1..]);
    if last.is_empty() || parent.is_empty() {
        return None;
    }
    // Keep "C:\" as the parent of "C:\x"
    if parent.len() == 2 && has_drive_prefix(parent) {
        return Some((&path[..=index], last));
    }
    Some((parent, last))
}

/// Join a child segment (or relative path) onto a normalized parent.
pub fn join_segment(parent: &str, child: &str) -> String {
    let child = child.trim_matches(|c| c == '\\' || c == '/');
    if parent.ends_with(SEPARATOR) {
        format!("{}{}", parent, child)
    } else {
        format!("{}{}{}", parent, SEPARATOR, child)
    }
}

/// Convert a crawl scope URL to a plain path.
///
/// Only `file:///` URLs name folders; protocol handler scopes such as
/// `iehistory://` or `mapi://` yield `None`.
pub fn scope_url_to_path(url: &str) -> Option<String> {
    let prefix = url.get(..FILE_URL_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(FILE_URL_PREFIX) {
        return None;
    }
    let trimmed = url[FILE_URL_PREFIX.len()..].trim_end_matches(SEPARATOR);
    if trimmed.len() == 2 && trimmed.ends_with(':') {
        Some(format!("{}{}", trimmed, SEPARATOR))
    } else {
        Some(trimmed.to_string())
    }
}

/// Folder URLs need a trailing separator; wildcard patterns must not get one.
pub fn path_to_scope_url(path: &str) -> String {
    let last = path.rsplit(SEPARATOR).next().unwrap_or_default();
    if last.contains(['*', '?']) || path.ends_with(SEPARATOR) {
        format!("{}{}", FILE_URL_PREFIX, path)
    } else {
        format!("{}{}{}", FILE_URL_PREFIX, path, SEPARATOR)
    }
}

/// Expand `%NAME%` placeholders from the process environment.
///
/// Unknown variables are left untouched, matching how the shell treats them.
pub fn expand_env_placeholders(input: &str) -> String {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let pattern = PLACEHOLDER
        .get_or_init(|| Regex::new(r"%([A-Za-z_][A-Za-z0-9_()]*)%").expect("valid placeholder regex"));

    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Name of the user running this process.
pub fn current_user() -> String {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Host name of this machine.
pub fn machine_name() -> String {
    sysinfo::System::host_name()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || bytes[2] == b'\\')
}

fn is_drive_root(path: &str) -> bool {
    path.len() == 3 && has_drive_prefix(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drive_path() {
        assert_eq!(normalize_scope_path(r"c:\Users\me\").unwrap(), r"C:\Users\me");
        assert_eq!(normalize_scope_path("c:/Users//me/docs").unwrap(), r"C:\Users\me\docs");
        assert_eq!(normalize_scope_path("  D:\\Data  ").unwrap(), r"D:\Data");
    }

    #[test]
    fn test_normalize_drive_root() {
        assert_eq!(normalize_scope_path(r"c:\").unwrap(), r"C:\");
        assert_eq!(normalize_scope_path("c:").unwrap(), r"C:\");
    }

    #[test]
    fn test_normalize_unc_path() {
        assert_eq!(
            normalize_scope_path(r"\\server\share\\docs\").unwrap(),
            r"\\server\share\docs"
        );
        assert!(normalize_scope_path(r"\\server").is_err());
    }

    #[test]
    fn test_rejects_relative_and_empty() {
        assert!(normalize_scope_path("").is_err());
        assert!(normalize_scope_path("   ").is_err());
        assert!(normalize_scope_path(r"Users\me").is_err());
        assert!(normalize_scope_path("/home/me").is_err());
    }

    #[test]
    fn test_rejects_long_path() {
        let long = format!(r"C:\{}", "a".repeat(300));
        let err = normalize_scope_path(&long).unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split_last_segment(r"C:\Data\*.log"), Some((r"C:\Data", "*.log")));
        assert_eq!(split_last_segment(r"C:\Data"), Some((r"C:\", "Data")));
        assert_eq!(split_last_segment(r"C:\"), None);
        assert_eq!(join_segment(r"C:\Data", "*.log"), r"C:\Data\*.log");
        assert_eq!(join_segment(r"C:\", "Data"), r"C:\Data");
    }

    #[test]
    fn test_scope_url_conversion() {
        assert_eq!(scope_url_to_path(r"file:///C:\Data\").as_deref(), Some(r"C:\Data"));
        assert_eq!(scope_url_to_path(r"FILE:///C:\").as_deref(), Some(r"C:\"));
        assert_eq!(path_to_scope_url(r"C:\Data"), r"file:///C:\Data\");
        assert_eq!(path_to_scope_url(r"C:\Data\*.log"), r"file:///C:\Data\*.log");
    }

    #[test]
    fn test_protocol_scopes_are_not_paths() {
        assert_eq!(scope_url_to_path("iehistory://{S-1-5-21-1004}/"), None);
        assert_eq!(scope_url_to_path("mapi://{S-1-5-21-1004}/"), None);
        assert_eq!(scope_url_to_path("file:"), None);
    }

    #[test]
    fn test_paths_equal_ignores_case() {
        assert!(paths_equal(r"C:\Data", r"c:\DATA"));
        assert!(!paths_equal(r"C:\Data", r"C:\Data2"));
    }

    #[test]
    fn test_expand_env_placeholders() {
        std::env::set_var("INDEXSCOPE_TEST_ROOT", r"C:\Windows");
        assert_eq!(
            expand_env_placeholders(r"%INDEXSCOPE_TEST_ROOT%\System32\x.dll"),
            r"C:\Windows\System32\x.dll"
        );
        assert_eq!(
            expand_env_placeholders(r"%INDEXSCOPE_SURELY_UNSET_VAR%\x.dll"),
            r"%INDEXSCOPE_SURELY_UNSET_VAR%\x.dll"
        );
    }

    #[test]
    fn test_identity_helpers_are_non_empty() {
        assert!(!current_user().is_empty());
        assert!(!machine_name().is_empty());
    }
}
