//! Top-level entry point tying registration, rules and documents together.

mod builder;

pub use builder::IndexScopeBuilder;

use crate::registration::{RegistrationOrchestrator, RegistrationPrompt};
use crate::rules::IndexRuleManager;
use crate::store::ConfigurationStore;
use crate::{IndexScopeError, Result};
use std::sync::Arc;

/// Main entry point for programmatic use.
///
/// A command first calls [`IndexScope::ensure_usable`]; once that returns
/// `true`, the rule manager and configuration store can be used directly.
pub struct IndexScope {
    orchestrator: RegistrationOrchestrator,
    rules: Arc<IndexRuleManager>,
    store: ConfigurationStore,
}

impl IndexScope {
    pub fn builder() -> IndexScopeBuilder {
        IndexScopeBuilder::new()
    }

    pub fn registration(&self) -> &RegistrationOrchestrator {
        &self.orchestrator
    }

    pub fn rules(&self) -> &IndexRuleManager {
        &self.rules
    }

    pub fn store(&self) -> &ConfigurationStore {
        &self.store
    }

    /// Check the access point and repair it per the repair flags in `args`.
    pub async fn ensure_usable<S: AsRef<str>>(
        &self,
        args: &[S],
        prompt: &dyn RegistrationPrompt,
    ) -> Result<bool> {
        self.orchestrator.ensure_usable(args, prompt).await
    }

    /// Like [`IndexScope::ensure_usable`], but an access point that is still
    /// unusable afterwards is an error.
    pub async fn require_usable<S: AsRef<str>>(
        &self,
        args: &[S],
        prompt: &dyn RegistrationPrompt,
    ) -> Result<()> {
        if self.ensure_usable(args, prompt).await? {
            Ok(())
        } else {
            Err(IndexScopeError::RegistrationUnresolved {
                reason: "the search manager is still not usable; run `register` as administrator"
                    .to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistrationConfig;
    use crate::native::memory::{
        InMemoryComponentRegistry, InMemoryExtensionStore, InMemoryScopeProvider,
        StaticIndexingService,
    };
    use crate::registration::NonInteractivePrompt;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_requires_every_port() {
        let result = IndexScope::builder()
            .scope_provider(Arc::new(InMemoryScopeProvider::new()))
            .build();
        assert!(result.is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_system_backend_unavailable_off_windows() {
        assert!(IndexScope::builder().with_system_backend().is_err());
    }

    #[tokio::test]
    async fn test_usable_scope_needs_no_repair() {
        let binary = NamedTempFile::new().unwrap();
        let scope = IndexScope::builder()
            .component_registry(Arc::new(InMemoryComponentRegistry::with_registration(
                RegistrationConfig::SEARCH_MANAGER_CLSID,
                &binary.path().display().to_string(),
            )))
            .scope_provider(Arc::new(InMemoryScopeProvider::new()))
            .extension_store(Arc::new(InMemoryExtensionStore::new()))
            .indexing_service(Arc::new(StaticIndexingService::running()))
            .build()
            .unwrap();

        let args: [&str; 0] = [];
        assert!(scope.ensure_usable(&args, &NonInteractivePrompt).await.unwrap());
        scope.require_usable(&args, &NonInteractivePrompt).await.unwrap();
        assert!(scope.rules().list_rules(false).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_registration_exits_with_8() {
        let scope = IndexScope::builder()
            .component_registry(Arc::new(InMemoryComponentRegistry::empty()))
            .scope_provider(Arc::new(InMemoryScopeProvider::new()))
            .extension_store(Arc::new(InMemoryExtensionStore::new()))
            .indexing_service(Arc::new(StaticIndexingService::running()))
            .build()
            .unwrap();

        let args = ["--no-register"];
        let err = scope
            .require_usable(&args[..], &NonInteractivePrompt)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexScopeError::RegistrationUnresolved { .. }));
        assert_eq!(err.exit_code(), 8);
    }
}
