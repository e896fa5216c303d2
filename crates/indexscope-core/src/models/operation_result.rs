//! Boundary result shape shared by every command.
//!
//! Inside the library every operation returns [`crate::Result`]. Front ends that
//! need a uniform, serializable envelope convert with
//! [`OperationResult::from_result`].

use crate::error::{ErrorKind, IndexScopeError};
use serde::{Deserialize, Serialize};

/// Serializable `{success, message, value?}` envelope.
///
/// # Example
///
/// ```ignore
/// use indexscope_core::models::OperationResult;
///
/// let response = OperationResult::from_result(manager.list_rules(false));
/// println!("{}", serde_json::to_string_pretty(&response)?);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    /// Error classification when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Suggested process exit code.
    #[serde(skip)]
    pub exit_code: i32,
}

impl<T> OperationResult<T> {
    /// Create a successful result carrying a value.
    pub fn success(value: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            value: Some(value),
            error_kind: None,
            exit_code: 0,
        }
    }

    /// Create a failed result from an error.
    pub fn failure(error: &IndexScopeError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            value: None,
            error_kind: Some(kind_name(error.kind()).to_string()),
            exit_code: error.exit_code(),
        }
    }

    /// Convert from a library result.
    pub fn from_result(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => Self::success(value, "ok"),
            Err(e) => Self::failure(&e),
        }
    }

    /// Replace the message of a successful result.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Get a reference to the value if present.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::Conflict => "conflict",
        ErrorKind::NotFound => "notFound",
        ErrorKind::AccessDenied => "accessDenied",
        ErrorKind::ServiceUnavailable => "serviceUnavailable",
        ErrorKind::Timeout => "timeout",
        ErrorKind::RegistrationUnresolved => "registrationUnresolved",
        ErrorKind::UnknownNative => "unknownNative",
        ErrorKind::Internal => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serialization() {
        let response = OperationResult::success(vec![1, 2, 3], "listed");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"value\":[1,2,3]"));
        assert!(!json.contains("errorKind"));
        assert_eq!(response.exit_code, 0);
    }

    #[test]
    fn test_failure_from_result() {
        let result: crate::Result<()> = Err(IndexScopeError::Conflict {
            path: r"C:\Data".into(),
        });
        let response = OperationResult::from_result(result);

        assert!(!response.success);
        assert!(response.value().is_none());
        assert_eq!(response.error_kind.as_deref(), Some("conflict"));
        assert_eq!(response.exit_code, 3);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"errorKind\":\"conflict\""));
        assert!(!json.contains("\"value\""));
    }
}
