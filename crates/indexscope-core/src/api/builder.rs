//! Builder for wiring an [`IndexScope`] to its native backend.

use std::sync::Arc;

use crate::api::IndexScope;
use crate::error::{IndexScopeError, Result};
use crate::native::{ComponentRegistry, CrawlScopeProvider, ExtensionStore, IndexingService};
use crate::registration::{
    AuditSink, RegistrationDetector, RegistrationOrchestrator, RepairCommand, TracingAuditSink,
};
use crate::rules::IndexRuleManager;
use crate::store::ConfigurationStore;

/// Builder for [`IndexScope`].
///
/// Every native port must be supplied, either one by one or all at once with
/// [`IndexScopeBuilder::with_system_backend`].
///
/// # Example
///
/// ```rust,ignore
/// let scope = IndexScope::builder()
///     .with_system_backend()?
///     .elevated(is_admin)
///     .audit_sink(Arc::new(TracingAuditSink))
///     .build()?;
/// ```
#[derive(Default)]
pub struct IndexScopeBuilder {
    registry: Option<Arc<dyn ComponentRegistry>>,
    provider: Option<Arc<dyn CrawlScopeProvider>>,
    extensions: Option<Arc<dyn ExtensionStore>>,
    service: Option<Arc<dyn IndexingService>>,
    audit: Option<Arc<dyn AuditSink>>,
    repair: Option<Box<dyn RepairCommand>>,
    is_elevated: bool,
    export_identity: Option<(String, String)>,
}

impl IndexScopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component_registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn scope_provider(mut self, provider: Arc<dyn CrawlScopeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn extension_store(mut self, extensions: Arc<dyn ExtensionStore>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    pub fn indexing_service(mut self, service: Arc<dyn IndexingService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Where registration attempts are recorded. Default: `TracingAuditSink`.
    pub fn audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Replace the repair tool. Default: regsvr32.
    pub fn repair_command(mut self, repair: Box<dyn RepairCommand>) -> Self {
        self.repair = Some(repair);
        self
    }

    /// Whether the calling process runs with administrator rights.
    ///
    /// Default: `false`
    pub fn elevated(mut self, is_elevated: bool) -> Self {
        self.is_elevated = is_elevated;
        self
    }

    /// Override the user and machine names stamped on exports.
    pub fn export_identity(mut self, exported_by: impl Into<String>, machine: impl Into<String>) -> Self {
        self.export_identity = Some((exported_by.into(), machine.into()));
        self
    }

    /// Use the Windows Search adapters for every port.
    #[cfg(windows)]
    pub fn with_system_backend(self) -> Result<Self> {
        use crate::native::windows::{
            RegistryExtensionStore, WindowsComponentRegistry, WindowsCrawlScope,
            WindowsSearchService,
        };

        Ok(self
            .component_registry(Arc::new(WindowsComponentRegistry::new()))
            .scope_provider(Arc::new(WindowsCrawlScope::new()))
            .extension_store(Arc::new(RegistryExtensionStore::new()))
            .indexing_service(Arc::new(WindowsSearchService::new())))
    }

    /// The native indexing subsystem only exists on Windows.
    #[cfg(not(windows))]
    pub fn with_system_backend(self) -> Result<Self> {
        Err(IndexScopeError::Other(format!(
            "the native indexing subsystem is not available on {}",
            crate::platform::current_platform()
        )))
    }

    pub fn build(self) -> Result<IndexScope> {
        let missing = |port: &str| IndexScopeError::Other(format!("no {} configured", port));
        let registry = self.registry.ok_or_else(|| missing("component registry"))?;
        let provider = self.provider.ok_or_else(|| missing("scope provider"))?;
        let extensions = self.extensions.ok_or_else(|| missing("extension store"))?;
        let service = self.service.ok_or_else(|| missing("indexing service"))?;
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink));

        let mut orchestrator =
            RegistrationOrchestrator::new(RegistrationDetector::new(registry), self.is_elevated, audit);
        if let Some(repair) = self.repair {
            orchestrator = orchestrator.with_repair_command(repair);
        }

        let rules = Arc::new(IndexRuleManager::new(provider, extensions, service));
        let mut store = ConfigurationStore::new(rules.clone());
        if let Some((exported_by, machine)) = self.export_identity {
            store = store.with_identity(exported_by, machine);
        }

        Ok(IndexScope {
            orchestrator,
            rules,
            store,
        })
    }
}
