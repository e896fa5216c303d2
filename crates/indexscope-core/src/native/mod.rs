//! Typed ports onto the native indexing subsystem.
//!
//! The domain never touches COM, the registry or the service manager
//! directly. Each concern is a small trait implemented by:
//! - `memory` - in-process implementations with the same error semantics
//! - `windows` - adapters over the Windows Search APIs (Windows only)
//!
//! All methods are blocking calls.

pub mod memory;
#[cfg(windows)]
pub mod windows;

use crate::error::NativeFault;

/// Result type for native adapter calls.
pub type NativeResult<T> = std::result::Result<T, NativeFault>;

/// One scope rule as enumerated by the indexing subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeScopeRule {
    pub path: String,
    pub is_included: bool,
    pub is_default: bool,
}

/// One entry of the per-extension depth store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredExtension {
    pub extension: String,
    pub value: u32,
    pub is_default: bool,
}

/// OS component registry holding the access point registration.
pub trait ComponentRegistry: Send + Sync {
    /// Registered server binary for `clsid`, unexpanded.
    ///
    /// `Ok(None)` means the class itself is not registered.
    fn server_binary(&self, clsid: &str) -> NativeResult<Option<String>>;

    /// Create (and immediately release) an instance of `clsid`.
    fn instantiate(&self, clsid: &str) -> NativeResult<()>;
}

/// Crawl scope rule list of the system catalog.
pub trait CrawlScopeProvider: Send + Sync {
    fn enumerate_rules(&self, include_defaults: bool) -> NativeResult<Vec<NativeScopeRule>>;

    fn add_rule(&self, path: &str, included: bool, recursive: bool) -> NativeResult<()>;

    fn remove_rule(&self, path: &str) -> NativeResult<()>;
}

/// Key-value store of per-extension indexing depth.
pub trait ExtensionStore: Send + Sync {
    fn list(&self) -> NativeResult<Vec<StoredExtension>>;

    /// The entry for one dot-prefixed extension, `None` when absent.
    fn read(&self, extension: &str) -> NativeResult<Option<StoredExtension>>;

    fn write(&self, extension: &str, value: u32) -> NativeResult<()>;
}

/// The background indexing service.
pub trait IndexingService: Send + Sync {
    fn is_running(&self) -> bool;

    fn name(&self) -> &str;
}
