//! Centralized configuration for indexscope.
//!
//! This module provides configuration constants for the search manager access
//! point, the repair process, the portable document and the native stores.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "indexscope";
    pub const AUDIT_LOG_FILENAME: &'static str = "registration-audit.jsonl";
}

/// Configuration for the search manager access point and its repair.
pub struct RegistrationConfig;

impl RegistrationConfig {
    /// CLSID of `CSearchManager`.
    pub const SEARCH_MANAGER_CLSID: &'static str = "{7D096C5F-AC08-4F1F-BEB7-5C22C517CE39}";
    /// In-process server backing the search manager class.
    pub const DEFAULT_BINARY_PATH: &'static str = r"%SystemRoot%\System32\SearchAPI.dll";
    pub const REPAIR_PROGRAM: &'static str = "regsvr32.exe";
    pub const REPAIR_METHOD: &'static str = "regsvr32";

    pub const DEFAULT_TIMEOUT_SECS: u32 = 30;
    pub const MIN_TIMEOUT_SECS: u32 = 1;
    pub const MAX_TIMEOUT_SECS: u32 = 60;

    // Repair-mode flags understood by `RegistrationOptions::from_args`
    pub const FLAG_AUTO_REGISTER: &'static str = "--auto-register";
    pub const FLAG_NO_REGISTER: &'static str = "--no-register";
    pub const FLAG_SILENT: &'static str = "--silent";
    pub const FLAG_TIMEOUT: &'static str = "--timeout";
    pub const FLAG_BINARY_PATH: &'static str = "--binary-path";

    pub fn default_timeout() -> Duration {
        Duration::from_secs(u64::from(Self::DEFAULT_TIMEOUT_SECS))
    }
}

/// Configuration for the portable configuration document.
pub struct DocumentConfig;

impl DocumentConfig {
    pub const SUPPORTED_VERSION: &'static str = "1.0";
    pub const MAX_PATH_LENGTH: usize = 260;
    pub const KEEP_BACKUP_ON_EXPORT: bool = true;
}

/// Configuration for the background indexing service.
pub struct IndexingServiceConfig;

impl IndexingServiceConfig {
    pub const SERVICE_NAME: &'static str = "WSearch";
    pub const CATALOG_NAME: &'static str = "SystemIndex";
}

/// Configuration for the per-extension indexing depth store.
pub struct ExtensionStoreConfig;

impl ExtensionStoreConfig {
    /// Registry key (under HKLM) holding one DWORD per extension.
    pub const REGISTRY_KEY: &'static str =
        r"SOFTWARE\Microsoft\Windows Search\Preferences\FileExtensions";
    /// Registry key (under HKLM) listing extensions that ship with the system.
    pub const DEFAULTS_REGISTRY_KEY: &'static str =
        r"SOFTWARE\Microsoft\Windows Search\Preferences\DefaultFileExtensions";
}
