//! In-memory native adapters.
//!
//! These mirror the observable behaviour of the Windows implementations:
//! duplicate paths (case-insensitive) are rejected, removing an unknown rule
//! reports `NotFound`, and depth values outside `0..=2` are refused. Faults can
//! be injected per path or per extension to exercise error handling.

use super::{
    ComponentRegistry, CrawlScopeProvider, ExtensionStore, IndexingService, NativeResult,
    NativeScopeRule, StoredExtension,
};
use crate::config::IndexingServiceConfig;
use crate::error::NativeFault;
use crate::platform::paths_equal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned lock only means another test thread panicked mid-update.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scope rule list kept in a vector, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryScopeProvider {
    rules: Mutex<Vec<NativeScopeRule>>,
    add_faults: Mutex<HashMap<String, NativeFault>>,
    remove_faults: Mutex<HashMap<String, NativeFault>>,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl InMemoryScopeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rule shipped with the system.
    pub fn with_default_rule(self, path: &str, included: bool) -> Self {
        lock(&self.rules).push(NativeScopeRule {
            path: path.to_string(),
            is_included: included,
            is_default: true,
        });
        self
    }

    /// Make the next `add_rule` calls for `path` fail with `fault`.
    pub fn fail_add(&self, path: &str, fault: NativeFault) {
        lock(&self.add_faults).insert(path.to_lowercase(), fault);
    }

    /// Make the next `remove_rule` calls for `path` fail with `fault`.
    pub fn fail_remove(&self, path: &str, fault: NativeFault) {
        lock(&self.remove_faults).insert(path.to_lowercase(), fault);
    }

    pub fn snapshot(&self) -> Vec<NativeScopeRule> {
        lock(&self.rules).clone()
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }
}

impl CrawlScopeProvider for InMemoryScopeProvider {
    fn enumerate_rules(&self, include_defaults: bool) -> NativeResult<Vec<NativeScopeRule>> {
        Ok(lock(&self.rules)
            .iter()
            .filter(|rule| include_defaults || !rule.is_default)
            .cloned()
            .collect())
    }

    fn add_rule(&self, path: &str, included: bool, _recursive: bool) -> NativeResult<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = lock(&self.add_faults).get(&path.to_lowercase()) {
            return Err(fault.clone());
        }
        let mut rules = lock(&self.rules);
        if rules.iter().any(|rule| paths_equal(&rule.path, path)) {
            return Err(NativeFault::DuplicateRule);
        }
        rules.push(NativeScopeRule {
            path: path.to_string(),
            is_included: included,
            is_default: false,
        });
        Ok(())
    }

    fn remove_rule(&self, path: &str) -> NativeResult<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = lock(&self.remove_faults).get(&path.to_lowercase()) {
            return Err(fault.clone());
        }
        let mut rules = lock(&self.rules);
        let before = rules.len();
        rules.retain(|rule| !paths_equal(&rule.path, path));
        if rules.len() == before {
            return Err(NativeFault::NotFound);
        }
        Ok(())
    }
}

/// Extension depth store keyed by lower-case extension.
#[derive(Debug, Default)]
pub struct InMemoryExtensionStore {
    entries: Mutex<BTreeMap<String, StoredExtension>>,
    write_faults: Mutex<HashMap<String, NativeFault>>,
}

impl InMemoryExtensionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry; `is_default` marks it as system-provided.
    pub fn with_entry(self, extension: &str, value: u32, is_default: bool) -> Self {
        lock(&self.entries).insert(
            extension.to_lowercase(),
            StoredExtension {
                extension: extension.to_lowercase(),
                value,
                is_default,
            },
        );
        self
    }

    pub fn fail_write(&self, extension: &str, fault: NativeFault) {
        lock(&self.write_faults).insert(extension.to_lowercase(), fault);
    }
}

impl ExtensionStore for InMemoryExtensionStore {
    fn list(&self) -> NativeResult<Vec<StoredExtension>> {
        Ok(lock(&self.entries).values().cloned().collect())
    }

    fn read(&self, extension: &str) -> NativeResult<Option<StoredExtension>> {
        Ok(lock(&self.entries).get(&extension.to_lowercase()).cloned())
    }

    fn write(&self, extension: &str, value: u32) -> NativeResult<()> {
        if let Some(fault) = lock(&self.write_faults).get(&extension.to_lowercase()) {
            return Err(fault.clone());
        }
        if value > 2 {
            return Err(NativeFault::failed(
                0x8007_0057_u32 as i32,
                format!("depth value {} is out of range", value),
            ));
        }
        let key = extension.to_lowercase();
        let mut entries = lock(&self.entries);
        let is_default = entries.get(&key).map(|e| e.is_default).unwrap_or(false);
        entries.insert(
            key.clone(),
            StoredExtension {
                extension: key,
                value,
                is_default,
            },
        );
        Ok(())
    }
}

/// Indexing service whose state is toggled by the caller.
#[derive(Debug)]
pub struct StaticIndexingService {
    running: AtomicBool,
}

impl StaticIndexingService {
    pub fn running() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    pub fn stopped() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

impl IndexingService for StaticIndexingService {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        IndexingServiceConfig::SERVICE_NAME
    }
}

/// Component registry with a configurable registration and instantiation result.
#[derive(Debug)]
pub struct InMemoryComponentRegistry {
    registered: Mutex<HashMap<String, String>>,
    instantiate_fault: Mutex<Option<NativeFault>>,
    instantiate_calls: AtomicUsize,
}

impl InMemoryComponentRegistry {
    /// Registry where nothing is registered.
    pub fn empty() -> Self {
        Self {
            registered: Mutex::new(HashMap::new()),
            instantiate_fault: Mutex::new(None),
            instantiate_calls: AtomicUsize::new(0),
        }
    }

    /// Registry where `clsid` is registered to `binary`.
    pub fn with_registration(clsid: &str, binary: &str) -> Self {
        let registry = Self::empty();
        registry.register(clsid, binary);
        registry
    }

    pub fn register(&self, clsid: &str, binary: &str) {
        lock(&self.registered).insert(clsid.to_uppercase(), binary.to_string());
    }

    pub fn unregister(&self, clsid: &str) {
        lock(&self.registered).remove(&clsid.to_uppercase());
    }

    pub fn fail_instantiation(&self, fault: Option<NativeFault>) {
        *lock(&self.instantiate_fault) = fault;
    }

    pub fn instantiate_calls(&self) -> usize {
        self.instantiate_calls.load(Ordering::SeqCst)
    }
}

impl ComponentRegistry for InMemoryComponentRegistry {
    fn server_binary(&self, clsid: &str) -> NativeResult<Option<String>> {
        Ok(lock(&self.registered).get(&clsid.to_uppercase()).cloned())
    }

    fn instantiate(&self, clsid: &str) -> NativeResult<()> {
        self.instantiate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = lock(&self.instantiate_fault).clone() {
            return Err(fault);
        }
        if lock(&self.registered).contains_key(&clsid.to_uppercase()) {
            Ok(())
        } else {
            Err(NativeFault::ClassNotRegistered)
        }
    }
}
