//! Detection of the search manager access point.
//!
//! Detection never fails: every problem, including a panicking adapter, is
//! folded into the returned [`RegistrationStatus`] or [`ValidationState`].

use crate::config::RegistrationConfig;
use crate::error::NativeFault;
use crate::models::{RegistrationOptions, RegistrationStatus, ValidationState};
use crate::native::ComponentRegistry;
use crate::platform::expand_env_placeholders;
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RegistrationDetector {
    registry: Arc<dyn ComponentRegistry>,
    clsid: String,
}

impl RegistrationDetector {
    pub fn new(registry: Arc<dyn ComponentRegistry>) -> Self {
        Self {
            registry,
            clsid: RegistrationConfig::SEARCH_MANAGER_CLSID.to_string(),
        }
    }

    /// Point detection at a different class identifier.
    pub fn with_clsid(mut self, clsid: impl Into<String>) -> Self {
        self.clsid = clsid.into();
        self
    }

    pub fn clsid(&self) -> &str {
        &self.clsid
    }

    /// Inspect the registration, the binary it names, and whether the class
    /// can actually be instantiated.
    pub fn get_status(&self) -> RegistrationStatus {
        let mut status = RegistrationStatus::unchecked();

        let lookup = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.server_binary(&self.clsid)
        }));
        match lookup {
            Ok(Ok(Some(raw))) => {
                let expanded = expand_env_placeholders(raw.trim().trim_matches('"'));
                status.access_point_exists = true;
                status.binary_exists = Path::new(&expanded).is_file();
                status.binary_path = Some(expanded);
            }
            Ok(Ok(None)) => {
                status.validation_state = ValidationState::AccessPointNotFound;
                status.error_message = Some(format!("{} is not registered", self.clsid));
                return self.stamp(status);
            }
            Ok(Err(fault)) => {
                warn!("Registration lookup for {} failed: {}", self.clsid, fault);
                status.validation_state = ValidationState::NativeError;
                status.error_message = Some(fault.to_string());
                return self.stamp(status);
            }
            Err(_) => {
                warn!("Registration lookup for {} panicked", self.clsid);
                status.validation_state = ValidationState::UnknownError;
                status.error_message = Some("registration lookup panicked".to_string());
                return self.stamp(status);
            }
        }

        let (state, message) = self.probe(&self.clsid);
        status.validation_state = state;
        status.error_message = message;
        if !status.binary_exists && status.error_message.is_none() {
            status.error_message = status
                .binary_path
                .as_ref()
                .map(|path| format!("registered binary does not exist: {}", path));
        }
        self.stamp(status)
    }

    /// Try to instantiate `clsid` and report how far that got.
    pub fn validate_component(&self, clsid: &str) -> ValidationState {
        self.probe(clsid).0
    }

    /// Binary the repair tool should register: the override, the path named by
    /// the current registration, or the stock location.
    pub fn resolve_binary_path(
        &self,
        options: &RegistrationOptions,
        status: &RegistrationStatus,
    ) -> PathBuf {
        if let Some(path) = options.binary_path_override() {
            return path.to_path_buf();
        }
        match &status.binary_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(expand_env_placeholders(
                RegistrationConfig::DEFAULT_BINARY_PATH,
            )),
        }
    }

    fn probe(&self, clsid: &str) -> (ValidationState, Option<String>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.registry.instantiate(clsid)));
        match outcome {
            Ok(Ok(())) => (ValidationState::Valid, None),
            Ok(Err(NativeFault::ClassNotRegistered)) => (
                ValidationState::AccessPointNotFound,
                Some(NativeFault::ClassNotRegistered.to_string()),
            ),
            Ok(Err(fault @ NativeFault::Failed { .. })) => {
                (ValidationState::NativeError, Some(fault.to_string()))
            }
            Ok(Err(fault)) => (ValidationState::InstantiationFailed, Some(fault.to_string())),
            Err(_) => {
                warn!("Instantiating {} panicked", clsid);
                (
                    ValidationState::UnknownError,
                    Some("instantiation panicked".to_string()),
                )
            }
        }
    }

    fn stamp(&self, mut status: RegistrationStatus) -> RegistrationStatus {
        status.checked_at = Utc::now();
        let status = status.finalize();
        debug!(
            "Registration status for {}: usable={} state={:?}",
            self.clsid, status.is_usable, status.validation_state
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::InMemoryComponentRegistry;
    use crate::native::NativeResult;
    use tempfile::NamedTempFile;

    const CLSID: &str = RegistrationConfig::SEARCH_MANAGER_CLSID;

    struct PanickingRegistry;

    impl ComponentRegistry for PanickingRegistry {
        fn server_binary(&self, _clsid: &str) -> NativeResult<Option<String>> {
            Ok(Some("/tmp".to_string()))
        }

        fn instantiate(&self, _clsid: &str) -> NativeResult<()> {
            panic!("adapter bug")
        }
    }

    #[test]
    fn test_usable_when_registered_and_instantiable() {
        let binary = NamedTempFile::new().unwrap();
        let registry = InMemoryComponentRegistry::with_registration(
            CLSID,
            &binary.path().display().to_string(),
        );
        let status = RegistrationDetector::new(Arc::new(registry)).get_status();
        assert!(status.is_usable);
        assert!(status.access_point_exists);
        assert!(status.binary_exists);
        assert_eq!(status.validation_state, ValidationState::Valid);
        assert!(status.error_message.is_none());
    }

    #[test]
    fn test_missing_registration() {
        let detector = RegistrationDetector::new(Arc::new(InMemoryComponentRegistry::empty()));
        let status = detector.get_status();
        assert!(!status.is_usable);
        assert!(!status.access_point_exists);
        assert_eq!(status.validation_state, ValidationState::AccessPointNotFound);
    }

    #[test]
    fn test_missing_binary_is_not_usable() {
        let registry = InMemoryComponentRegistry::with_registration(CLSID, "/no/such/SearchAPI.dll");
        let status = RegistrationDetector::new(Arc::new(registry)).get_status();
        assert!(status.access_point_exists);
        assert!(!status.binary_exists);
        assert_eq!(status.validation_state, ValidationState::Valid);
        assert!(!status.is_usable);
        assert!(status.error_message.unwrap().contains("does not exist"));
    }

    #[test]
    fn test_instantiation_fault_mapping() {
        let registry = Arc::new(InMemoryComponentRegistry::with_registration(CLSID, "x.dll"));
        let detector = RegistrationDetector::new(registry.clone());

        registry.fail_instantiation(Some(NativeFault::AccessDenied));
        assert_eq!(
            detector.validate_component(CLSID),
            ValidationState::InstantiationFailed
        );

        registry.fail_instantiation(Some(NativeFault::failed(-1, "boom")));
        assert_eq!(detector.validate_component(CLSID), ValidationState::NativeError);

        registry.fail_instantiation(None);
        assert_eq!(
            detector.validate_component("{00000000-0000-0000-0000-000000000000}"),
            ValidationState::AccessPointNotFound
        );
    }

    #[test]
    fn test_panicking_adapter_is_contained() {
        let detector = RegistrationDetector::new(Arc::new(PanickingRegistry));
        let status = detector.get_status();
        assert_eq!(status.validation_state, ValidationState::UnknownError);
        assert!(!status.is_usable);
    }

    #[test]
    fn test_resolve_binary_prefers_override() {
        let file = NamedTempFile::new().unwrap();
        let detector = RegistrationDetector::new(Arc::new(InMemoryComponentRegistry::empty()));
        let options = RegistrationOptions::builder()
            .binary_path_override(file.path())
            .build()
            .unwrap();
        let status = detector.get_status();
        assert_eq!(detector.resolve_binary_path(&options, &status), file.path());

        let default = detector.resolve_binary_path(&RegistrationOptions::default(), &status);
        assert!(default.to_string_lossy().ends_with("SearchAPI.dll"));
    }
}
