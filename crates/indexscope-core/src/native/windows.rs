//! Windows Search adapters.
//!
//! - `WindowsComponentRegistry` - `HKCR\CLSID\{clsid}\InprocServer32` + `CoCreateInstance`
//! - `WindowsCrawlScope` - `ISearchManager` -> `SystemIndex` catalog -> crawl scope manager
//! - `RegistryExtensionStore` - one DWORD per extension under HKLM
//! - `WindowsSearchService` - SCM status of `WSearch`
//!
//! HRESULTs and Win32 status codes are folded into [`NativeFault`] here; nothing
//! above this module sees a raw code except through `NativeFault::Failed`.
#![allow(unsafe_code)]

use super::{
    ComponentRegistry, CrawlScopeProvider, ExtensionStore, IndexingService, NativeResult,
    NativeScopeRule, StoredExtension,
};
use crate::config::{ExtensionStoreConfig, IndexingServiceConfig};
use crate::error::NativeFault;
use crate::platform::paths::{path_to_scope_url, scope_url_to_path};
use crate::platform::paths_equal;
use tracing::debug;
use windows::core::{BOOL, HRESULT, HSTRING, IUnknown, PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_ITEMS, ERROR_PATH_NOT_FOUND,
    ERROR_SUCCESS, RPC_E_CHANGED_MODE, S_FALSE, S_OK, WIN32_ERROR,
};
use windows::Win32::System::Com::{
    CLSIDFromString, CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize,
    CLSCTX_INPROC_SERVER, CLSCTX_LOCAL_SERVER, COINIT_MULTITHREADED,
};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegEnumValueW, RegGetValueW, RegOpenKeyExW, RegSetValueExW,
    HKEY, HKEY_CLASSES_ROOT, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE,
    REG_DWORD, REG_OPTION_NON_VOLATILE, REG_VALUE_TYPE, RRF_NOEXPAND, RRF_RT_REG_DWORD,
    RRF_RT_REG_EXPAND_SZ, RRF_RT_REG_SZ,
};
use windows::Win32::System::Search::{
    CSearchManager, ISearchCrawlScopeManager, ISearchManager, ISearchScopeRule,
    FF_INDEXCOMPLEXURLS,
};
use windows::Win32::System::Services::{
    CloseServiceHandle, OpenSCManagerW, OpenServiceW, QueryServiceStatus, SC_HANDLE,
    SC_MANAGER_CONNECT, SERVICE_QUERY_STATUS, SERVICE_RUNNING, SERVICE_STATUS,
};

fn to_wide(s: &str) -> Vec<u16> {
    let mut wide: Vec<u16> = s.encode_utf16().collect();
    wide.push(0);
    wide
}

fn fault_from_hresult(hr: HRESULT, context: &str) -> NativeFault {
    match hr.0 as u32 {
        0x8007_0005 => NativeFault::AccessDenied,
        0x8004_0154 => NativeFault::ClassNotRegistered,
        0x8007_0002 | 0x8007_0003 => NativeFault::NotFound,
        0x8007_00B7 => NativeFault::DuplicateRule,
        _ => NativeFault::failed(hr.0, format!("{}: {}", context, hr.message())),
    }
}

fn fault_from_error(err: &windows::core::Error, context: &str) -> NativeFault {
    fault_from_hresult(err.code(), context)
}

fn fault_from_status(status: WIN32_ERROR, context: &str) -> NativeFault {
    if status == ERROR_ACCESS_DENIED {
        NativeFault::AccessDenied
    } else if status == ERROR_FILE_NOT_FOUND || status == ERROR_PATH_NOT_FOUND {
        NativeFault::NotFound
    } else {
        fault_from_hresult(status.to_hresult(), context)
    }
}

/// COM apartment for the current call; uninitializes only what it initialized.
struct ComGuard(bool);

impl ComGuard {
    fn enter() -> NativeResult<Self> {
        // SAFETY: no reserved pointer is passed; the matching CoUninitialize runs
        // in Drop only when this call performed the initialization.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == S_OK || hr == S_FALSE {
            Ok(Self(true))
        } else if hr == RPC_E_CHANGED_MODE {
            // Already initialized with another model by the host.
            Ok(Self(false))
        } else {
            Err(fault_from_hresult(hr, "CoInitializeEx"))
        }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.0 {
            // SAFETY: balanced with the successful CoInitializeEx in `enter`.
            unsafe { CoUninitialize() }
        }
    }
}

/// Registry key handle closed on drop.
struct RegKey(HKEY);

impl RegKey {
    fn open(root: HKEY, subkey: &str, access: windows::Win32::System::Registry::REG_SAM_FLAGS) -> NativeResult<Option<Self>> {
        let wide = to_wide(subkey);
        let mut key = HKEY::default();
        // SAFETY: `wide` is NUL-terminated and outlives the call; `key` is a
        // valid out pointer.
        let status = unsafe { RegOpenKeyExW(root, PCWSTR(wide.as_ptr()), Some(0), access, &mut key) };
        if status == ERROR_SUCCESS {
            Ok(Some(Self(key)))
        } else if status == ERROR_FILE_NOT_FOUND || status == ERROR_PATH_NOT_FOUND {
            Ok(None)
        } else {
            Err(fault_from_status(status, subkey))
        }
    }

    fn create(root: HKEY, subkey: &str) -> NativeResult<Self> {
        let wide = to_wide(subkey);
        let mut key = HKEY::default();
        // SAFETY: same as `open`; no class, security attributes or disposition.
        let status = unsafe {
            RegCreateKeyExW(
                root,
                PCWSTR(wide.as_ptr()),
                Some(0),
                None,
                REG_OPTION_NON_VOLATILE,
                KEY_SET_VALUE | KEY_QUERY_VALUE,
                None,
                &mut key,
                None,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(fault_from_status(status, subkey));
        }
        Ok(Self(key))
    }

    /// Read a string value (`None` name reads the default value) without
    /// expanding `%VAR%` placeholders.
    fn read_string(&self, name: Option<&str>) -> NativeResult<Option<String>> {
        let wide_name = name.map(to_wide);
        let name_ptr = wide_name
            .as_ref()
            .map(|w| PCWSTR(w.as_ptr()))
            .unwrap_or(PCWSTR::null());
        let flags = RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ | RRF_NOEXPAND;
        let mut value_type = REG_VALUE_TYPE(0);
        let mut size_bytes: u32 = 0;
        // SAFETY: size query only; no data pointer is passed.
        let status = unsafe {
            RegGetValueW(self.0, PCWSTR::null(), name_ptr, flags, Some(&mut value_type), None, Some(&mut size_bytes))
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(fault_from_status(status, "RegGetValueW"));
        }

        let mut buffer: Vec<u16> = vec![0u16; (size_bytes as usize / 2).max(1)];
        // SAFETY: `buffer` holds `size_bytes` bytes as reported by the size query.
        let status = unsafe {
            RegGetValueW(
                self.0,
                PCWSTR::null(),
                name_ptr,
                flags,
                Some(&mut value_type),
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut size_bytes),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(fault_from_status(status, "RegGetValueW"));
        }
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        Ok(Some(String::from_utf16_lossy(&buffer[..len])))
    }

    fn read_dword(&self, name: &str) -> NativeResult<Option<u32>> {
        let wide_name = to_wide(name);
        let mut value: u32 = 0;
        let mut size_bytes = std::mem::size_of::<u32>() as u32;
        // SAFETY: `value` is a valid 4-byte buffer matching `size_bytes`.
        let status = unsafe {
            RegGetValueW(
                self.0,
                PCWSTR::null(),
                PCWSTR(wide_name.as_ptr()),
                RRF_RT_REG_DWORD,
                None,
                Some(&mut value as *mut u32 as *mut _),
                Some(&mut size_bytes),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        if status != ERROR_SUCCESS {
            return Err(fault_from_status(status, name));
        }
        Ok(Some(value))
    }

    fn write_dword(&self, name: &str, value: u32) -> NativeResult<()> {
        let wide_name = to_wide(name);
        let bytes = value.to_le_bytes();
        // SAFETY: `wide_name` is NUL-terminated; `bytes` is the DWORD payload.
        let status = unsafe {
            RegSetValueExW(self.0, PCWSTR(wide_name.as_ptr()), Some(0), REG_DWORD, Some(&bytes))
        };
        if status != ERROR_SUCCESS {
            return Err(fault_from_status(status, name));
        }
        Ok(())
    }

    fn value_names(&self) -> NativeResult<Vec<String>> {
        let mut names = Vec::new();
        let mut index: u32 = 0;
        let mut name_buf: [u16; 256] = [0; 256];
        loop {
            let mut name_len = name_buf.len() as u32;
            // SAFETY: `name_buf` is writable for `name_len` UTF-16 units.
            let status = unsafe {
                RegEnumValueW(
                    self.0,
                    index,
                    Some(PWSTR(name_buf.as_mut_ptr())),
                    &mut name_len,
                    None,
                    None,
                    None,
                    None,
                )
            };
            if status == ERROR_NO_MORE_ITEMS {
                break;
            }
            if status != ERROR_SUCCESS {
                return Err(fault_from_status(status, "RegEnumValueW"));
            }
            names.push(String::from_utf16_lossy(&name_buf[..name_len as usize]));
            index += 1;
        }
        Ok(names)
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        // SAFETY: the handle was opened by this wrapper and is closed once.
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

/// Component registry backed by `HKEY_CLASSES_ROOT` and COM activation.
#[derive(Debug, Default)]
pub struct WindowsComponentRegistry;

impl WindowsComponentRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl ComponentRegistry for WindowsComponentRegistry {
    fn server_binary(&self, clsid: &str) -> NativeResult<Option<String>> {
        let subkey = format!(r"CLSID\{}\InprocServer32", clsid);
        match RegKey::open(HKEY_CLASSES_ROOT, &subkey, KEY_QUERY_VALUE)? {
            Some(key) => key.read_string(None),
            None => Ok(None),
        }
    }

    fn instantiate(&self, clsid: &str) -> NativeResult<()> {
        let _com = ComGuard::enter()?;
        // SAFETY: COM is initialized for this thread by `_com`; the instance is
        // released when `unknown` drops.
        unsafe {
            let guid = CLSIDFromString(&HSTRING::from(clsid))
                .map_err(|e| fault_from_error(&e, "CLSIDFromString"))?;
            let unknown: IUnknown =
                CoCreateInstance(&guid, None, CLSCTX_INPROC_SERVER | CLSCTX_LOCAL_SERVER)
                    .map_err(|e| fault_from_error(&e, "CoCreateInstance"))?;
            drop(unknown);
        }
        debug!("Instantiated {}", clsid);
        Ok(())
    }
}

/// Crawl scope rules of the `SystemIndex` catalog.
#[derive(Debug, Default)]
pub struct WindowsCrawlScope;

impl WindowsCrawlScope {
    pub fn new() -> Self {
        Self
    }

    fn with_scope_manager<T>(
        &self,
        f: impl FnOnce(&ISearchCrawlScopeManager) -> NativeResult<T>,
    ) -> NativeResult<T> {
        let _com = ComGuard::enter()?;
        // SAFETY: COM is initialized for the lifetime of `_com`; every
        // interface obtained here is released before it drops.
        let scope = unsafe {
            let manager: ISearchManager = CoCreateInstance(&CSearchManager, None, CLSCTX_LOCAL_SERVER)
                .map_err(|e| fault_from_error(&e, "CoCreateInstance(CSearchManager)"))?;
            let catalog = manager
                .GetCatalog(&HSTRING::from(IndexingServiceConfig::CATALOG_NAME))
                .map_err(|e| fault_from_error(&e, "GetCatalog"))?;
            catalog
                .GetCrawlScopeManager()
                .map_err(|e| fault_from_error(&e, "GetCrawlScopeManager"))?
        };
        f(&scope)
    }

    fn read_rules(scope: &ISearchCrawlScopeManager) -> NativeResult<Vec<NativeScopeRule>> {
        let mut rules = Vec::new();
        // SAFETY: rule URLs are CoTaskMem allocations owned by the caller and
        // freed right after conversion.
        unsafe {
            let enumerator = scope
                .EnumerateScopeRules()
                .map_err(|e| fault_from_error(&e, "EnumerateScopeRules"))?;
            loop {
                let mut slot: [Option<ISearchScopeRule>; 1] = [None];
                let mut fetched: u32 = 0;
                let hr = enumerator.Next(&mut slot, Some(&mut fetched));
                if hr != S_OK || fetched == 0 {
                    break;
                }
                let Some(rule) = slot[0].take() else { break };

                let url_ptr = rule
                    .PatternOrURL()
                    .map_err(|e| fault_from_error(&e, "PatternOrURL"))?;
                let url = url_ptr.to_string().unwrap_or_default();
                CoTaskMemFree(Some(url_ptr.0 as *const _));

                let is_included = rule
                    .IsIncluded()
                    .map_err(|e| fault_from_error(&e, "IsIncluded"))?
                    .as_bool();
                let is_default = rule
                    .IsDefault()
                    .map_err(|e| fault_from_error(&e, "IsDefault"))?
                    .as_bool();
                // Protocol handler scopes (iehistory://, mapi://) are not folder rules
                let Some(path) = scope_url_to_path(&url) else {
                    debug!("Skipping non-file scope rule {}", url);
                    continue;
                };
                rules.push(NativeScopeRule {
                    path,
                    is_included,
                    is_default,
                });
            }
        }
        Ok(rules)
    }

    fn contains(scope: &ISearchCrawlScopeManager, path: &str) -> NativeResult<bool> {
        Ok(Self::read_rules(scope)?
            .iter()
            .any(|rule| paths_equal(&rule.path, path)))
    }
}

impl CrawlScopeProvider for WindowsCrawlScope {
    fn enumerate_rules(&self, include_defaults: bool) -> NativeResult<Vec<NativeScopeRule>> {
        self.with_scope_manager(|scope| {
            let mut rules = Self::read_rules(scope)?;
            if !include_defaults {
                rules.retain(|rule| !rule.is_default);
            }
            Ok(rules)
        })
    }

    fn add_rule(&self, path: &str, included: bool, recursive: bool) -> NativeResult<()> {
        self.with_scope_manager(|scope| {
            // The crawl scope manager silently replaces an existing rule.
            if Self::contains(scope, path)? {
                return Err(NativeFault::DuplicateRule);
            }
            let url = path_to_scope_url(path);
            // SAFETY: all arguments are owned values living across the call.
            unsafe {
                scope
                    .AddUserScopeRule(
                        &HSTRING::from(url.as_str()),
                        BOOL::from(included),
                        BOOL::from(recursive),
                        FF_INDEXCOMPLEXURLS.0 as u32,
                    )
                    .map_err(|e| fault_from_error(&e, "AddUserScopeRule"))?;
                scope.SaveAll().map_err(|e| fault_from_error(&e, "SaveAll"))?;
            }
            debug!("Added scope rule {}", url);
            Ok(())
        })
    }

    fn remove_rule(&self, path: &str) -> NativeResult<()> {
        self.with_scope_manager(|scope| {
            // RemoveScopeRule reports S_FALSE rather than an error for unknown rules.
            if !Self::contains(scope, path)? {
                return Err(NativeFault::NotFound);
            }
            let url = path_to_scope_url(path);
            // SAFETY: see `add_rule`.
            unsafe {
                scope
                    .RemoveScopeRule(&HSTRING::from(url.as_str()))
                    .map_err(|e| fault_from_error(&e, "RemoveScopeRule"))?;
                scope.SaveAll().map_err(|e| fault_from_error(&e, "SaveAll"))?;
            }
            debug!("Removed scope rule {}", url);
            Ok(())
        })
    }
}

/// Per-extension depth values stored as DWORDs under HKLM.
#[derive(Debug, Default)]
pub struct RegistryExtensionStore;

impl RegistryExtensionStore {
    pub fn new() -> Self {
        Self
    }

    fn default_names(&self) -> NativeResult<Vec<String>> {
        match RegKey::open(HKEY_LOCAL_MACHINE, ExtensionStoreConfig::DEFAULTS_REGISTRY_KEY, KEY_QUERY_VALUE)? {
            Some(key) => key.value_names(),
            None => Ok(Vec::new()),
        }
    }
}

impl ExtensionStore for RegistryExtensionStore {
    fn list(&self) -> NativeResult<Vec<StoredExtension>> {
        let Some(key) = RegKey::open(HKEY_LOCAL_MACHINE, ExtensionStoreConfig::REGISTRY_KEY, KEY_QUERY_VALUE)? else {
            return Ok(Vec::new());
        };
        let defaults = self.default_names()?;
        let mut entries = Vec::new();
        for name in key.value_names()? {
            if let Some(value) = key.read_dword(&name)? {
                entries.push(StoredExtension {
                    is_default: defaults.iter().any(|d| d.eq_ignore_ascii_case(&name)),
                    extension: name,
                    value,
                });
            }
        }
        Ok(entries)
    }

    fn read(&self, extension: &str) -> NativeResult<Option<StoredExtension>> {
        let Some(key) = RegKey::open(HKEY_LOCAL_MACHINE, ExtensionStoreConfig::REGISTRY_KEY, KEY_QUERY_VALUE)? else {
            return Ok(None);
        };
        let Some(value) = key.read_dword(extension)? else {
            return Ok(None);
        };
        let defaults = self.default_names()?;
        Ok(Some(StoredExtension {
            is_default: defaults.iter().any(|d| d.eq_ignore_ascii_case(extension)),
            extension: extension.to_string(),
            value,
        }))
    }

    fn write(&self, extension: &str, value: u32) -> NativeResult<()> {
        let key = RegKey::create(HKEY_LOCAL_MACHINE, ExtensionStoreConfig::REGISTRY_KEY)?;
        key.write_dword(extension, value)
    }
}

/// Service handle closed on drop.
struct ServiceHandle(SC_HANDLE);

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        // SAFETY: the handle was returned by OpenSCManagerW/OpenServiceW.
        let _ = unsafe { CloseServiceHandle(self.0) };
    }
}

/// The Windows Search service as seen by the service control manager.
#[derive(Debug, Clone)]
pub struct WindowsSearchService {
    name: String,
}

impl Default for WindowsSearchService {
    fn default() -> Self {
        Self {
            name: IndexingServiceConfig::SERVICE_NAME.to_string(),
        }
    }
}

impl WindowsSearchService {
    pub fn new() -> Self {
        Self::default()
    }

    fn query_running(&self) -> windows::core::Result<bool> {
        // SAFETY: handles are wrapped immediately and closed on drop; `status`
        // is a valid out parameter.
        unsafe {
            let scm = ServiceHandle(OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT)?);
            let service = ServiceHandle(OpenServiceW(
                scm.0,
                &HSTRING::from(self.name.as_str()),
                SERVICE_QUERY_STATUS,
            )?);
            let mut status = SERVICE_STATUS::default();
            QueryServiceStatus(service.0, &mut status)?;
            Ok(status.dwCurrentState == SERVICE_RUNNING)
        }
    }
}

impl IndexingService for WindowsSearchService {
    fn is_running(&self) -> bool {
        match self.query_running() {
            Ok(running) => running,
            Err(e) => {
                debug!("Failed to query {} status: {}", self.name, e.message());
                false
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
