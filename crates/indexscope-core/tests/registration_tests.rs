//! Integration tests for detecting and repairing the access point registration.
//!
//! Repairs that spawn a real process use `sh` and therefore only run on Unix.

use indexscope_core::config::RegistrationConfig;
use indexscope_core::native::memory::InMemoryComponentRegistry;
use indexscope_core::native::{ComponentRegistry, NativeResult};
use indexscope_core::registration::{RepairCommand, RepairInvocation};
use indexscope_core::{
    MemoryAuditSink, NativeFault, RegistrationAttempt, RegistrationDetector, RegistrationMode,
    RegistrationOptions, RegistrationOrchestrator, RegistrationOutcome, RegistrationPrompt,
    RegistrationStatus, RepairChoice, ValidationState,
};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

const CLSID: &str = RegistrationConfig::SEARCH_MANAGER_CLSID;

/// Repair command that counts how often a process would be spawned.
struct CountingRepair {
    spawned: Arc<AtomicUsize>,
    script: String,
}

impl CountingRepair {
    fn new(script: &str) -> (Self, Arc<AtomicUsize>) {
        let spawned = Arc::new(AtomicUsize::new(0));
        (
            Self {
                spawned: spawned.clone(),
                script: script.to_string(),
            },
            spawned,
        )
    }
}

impl RepairCommand for CountingRepair {
    fn method(&self) -> &str {
        "test-script"
    }

    fn invocation(&self, binary: &Path, _silent: bool) -> RepairInvocation {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        RepairInvocation {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                self.script.clone(),
                "repair".to_string(),
                binary.display().to_string(),
            ],
        }
    }
}

/// Registry whose class becomes instantiable once a marker file exists.
struct MarkerRegistry {
    binary: String,
    marker: PathBuf,
}

impl ComponentRegistry for MarkerRegistry {
    fn server_binary(&self, _clsid: &str) -> NativeResult<Option<String>> {
        Ok(Some(self.binary.clone()))
    }

    fn instantiate(&self, _clsid: &str) -> NativeResult<()> {
        if self.marker.exists() {
            Ok(())
        } else {
            Err(NativeFault::ClassNotRegistered)
        }
    }
}

/// Prompt answering with a fixed choice and remembering what it was asked to show.
struct ScriptedPrompt {
    choice: RepairChoice,
    asked: Cell<usize>,
    elevation_shown: Cell<bool>,
    instructions_for: RefCell<Option<PathBuf>>,
    reported: RefCell<Vec<RegistrationAttempt>>,
}

impl ScriptedPrompt {
    fn answering(choice: RepairChoice) -> Self {
        Self {
            choice,
            asked: Cell::new(0),
            elevation_shown: Cell::new(false),
            instructions_for: RefCell::new(None),
            reported: RefCell::new(Vec::new()),
        }
    }
}

impl RegistrationPrompt for ScriptedPrompt {
    fn choose(&self, _status: &RegistrationStatus) -> RepairChoice {
        self.asked.set(self.asked.get() + 1);
        self.choice
    }

    fn show_elevation_guidance(&self) {
        self.elevation_shown.set(true);
    }

    fn show_manual_instructions(&self, binary_path: &Path) {
        *self.instructions_for.borrow_mut() = Some(binary_path.to_path_buf());
    }

    fn report(&self, attempt: &RegistrationAttempt) {
        self.reported.borrow_mut().push(attempt.clone());
    }
}

/// Registered, binary present, but instantiation keeps failing.
fn broken_registry(binary: &NamedTempFile) -> Arc<InMemoryComponentRegistry> {
    let registry = Arc::new(InMemoryComponentRegistry::with_registration(
        CLSID,
        &binary.path().display().to_string(),
    ));
    registry.fail_instantiation(Some(NativeFault::ClassNotRegistered));
    registry
}

fn orchestrator(
    registry: Arc<dyn ComponentRegistry>,
    elevated: bool,
    script: &str,
) -> (RegistrationOrchestrator, Arc<MemoryAuditSink>, Arc<AtomicUsize>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let (repair, spawned) = CountingRepair::new(script);
    let orchestrator =
        RegistrationOrchestrator::new(RegistrationDetector::new(registry), elevated, audit.clone())
            .with_repair_command(Box::new(repair));
    (orchestrator, audit, spawned)
}

// ========================================
// register
// ========================================

#[tokio::test]
async fn test_usable_registration_short_circuits() {
    let binary = NamedTempFile::new().unwrap();
    let registry = Arc::new(InMemoryComponentRegistry::with_registration(
        CLSID,
        &binary.path().display().to_string(),
    ));
    let (orchestrator, audit, spawned) = orchestrator(registry, false, "exit 1");

    let attempt = orchestrator
        .register(&RegistrationOptions::default())
        .await
        .unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::Success);
    assert_eq!(attempt.mode, RegistrationMode::Manual);
    assert_eq!(attempt.exit_code, None);
    assert_eq!(attempt.post_validation, ValidationState::Valid);
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
    assert_eq!(audit.attempts().len(), 1);
}

#[tokio::test]
async fn test_missing_binary_fails_before_privilege_check() {
    let registry = Arc::new(InMemoryComponentRegistry::with_registration(
        CLSID,
        "/no/such/dir/SearchAPI.dll",
    ));
    let (orchestrator, audit, spawned) = orchestrator(registry, false, "exit 0");

    let attempt = orchestrator
        .register(&RegistrationOptions::default())
        .await
        .unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::BinaryNotFound);
    assert_eq!(attempt.binary_path, "/no/such/dir/SearchAPI.dll");
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
    assert_eq!(audit.attempts()[0].outcome, RegistrationOutcome::BinaryNotFound);
}

#[tokio::test]
async fn test_unprivileged_repair_is_not_attempted() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, _, spawned) = orchestrator(broken_registry(&binary), false, "exit 0");

    let options = RegistrationOptions::builder()
        .auto_register(true)
        .build()
        .unwrap();
    let attempt = orchestrator.register(&options).await.unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::InsufficientPrivileges);
    assert_eq!(attempt.mode, RegistrationMode::Automatic);
    assert!(!attempt.is_elevated);
    assert_eq!(attempt.post_validation, ValidationState::AccessPointNotFound);
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
}

#[test]
fn test_conflicting_options_fail_construction() {
    let result = RegistrationOptions::builder()
        .auto_register(true)
        .no_register(true)
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_conflicting_flags_fail_before_any_work() {
    let binary = NamedTempFile::new().unwrap();
    let registry = broken_registry(&binary);
    let (orchestrator, audit, spawned) = orchestrator(registry.clone(), true, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Accept);

    let result = orchestrator
        .handle_missing_registration(&["--auto-register", "--no-register"], &prompt)
        .await;

    assert!(result.is_err());
    assert_eq!(registry.instantiate_calls(), 0);
    assert_eq!(prompt.asked.get(), 0);
    assert!(audit.attempts().is_empty());
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_clean_exit_without_working_component_is_validation_failure() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, _, spawned) = orchestrator(broken_registry(&binary), true, "exit 0");

    let attempt = orchestrator
        .register(&RegistrationOptions::default())
        .await
        .unwrap();

    assert_eq!(spawned.load(Ordering::SeqCst), 1);
    assert_eq!(attempt.exit_code, Some(0));
    assert_eq!(attempt.outcome, RegistrationOutcome::ValidationFailed);
    assert_eq!(attempt.post_validation, ValidationState::AccessPointNotFound);
}

#[cfg(unix)]
#[tokio::test]
async fn test_repair_success_is_revalidated() {
    let temp_dir = TempDir::new().unwrap();
    let binary = NamedTempFile::new().unwrap();
    let marker = temp_dir.path().join("registered");
    let registry = Arc::new(MarkerRegistry {
        binary: binary.path().display().to_string(),
        marker: marker.clone(),
    });
    let script = format!("touch '{}'", marker.display());
    let (orchestrator, audit, _) = orchestrator(registry, true, &script);

    let attempt = orchestrator
        .register(&RegistrationOptions::default())
        .await
        .unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::Success);
    assert_eq!(attempt.post_validation, ValidationState::Valid);
    assert!(orchestrator.detector().get_status().is_usable);
    assert_eq!(audit.attempts()[0].id, attempt.id);
}

#[cfg(unix)]
#[tokio::test]
async fn test_nonzero_exit_is_failure_with_stderr() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, _, _) = orchestrator(
        broken_registry(&binary),
        true,
        "echo 'module failed to load' >&2; exit 5",
    );

    let attempt = orchestrator
        .register(&RegistrationOptions::default())
        .await
        .unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::Failed);
    assert_eq!(attempt.exit_code, Some(5));
    assert_eq!(attempt.error_message.as_deref(), Some("module failed to load"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_the_repair_process() {
    use indexscope_core::platform::is_process_alive;

    let temp_dir = TempDir::new().unwrap();
    let pid_file = temp_dir.path().join("repair.pid");
    let binary = NamedTempFile::new().unwrap();
    let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
    let (orchestrator, _, _) = orchestrator(broken_registry(&binary), true, &script);

    let options = RegistrationOptions::builder()
        .timeout_seconds(1)
        .build()
        .unwrap();
    let attempt = orchestrator.register(&options).await.unwrap();

    assert_eq!(attempt.outcome, RegistrationOutcome::Timeout);
    assert!(attempt.duration_ms >= 1000);
    assert!(attempt.duration_ms < 10_000);

    let pid: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(!is_process_alive(pid));
}

// ========================================
// handle_missing_registration
// ========================================

#[tokio::test]
async fn test_no_register_returns_immediately() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, audit, _) = orchestrator(broken_registry(&binary), true, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Accept);

    let resolved = orchestrator
        .handle_missing_registration(&["--no-register"], &prompt)
        .await
        .unwrap();

    assert!(!resolved);
    assert_eq!(prompt.asked.get(), 0);
    assert!(audit.attempts().is_empty());
}

#[tokio::test]
async fn test_auto_register_reports_outcome() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, audit, _) = orchestrator(broken_registry(&binary), false, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Decline);

    let resolved = orchestrator
        .handle_missing_registration(&["status", "--auto-register"], &prompt)
        .await
        .unwrap();

    assert!(!resolved);
    assert_eq!(prompt.asked.get(), 0);
    let reported = prompt.reported.borrow();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].mode, RegistrationMode::Automatic);
    assert_eq!(reported[0].outcome, RegistrationOutcome::InsufficientPrivileges);
    assert_eq!(audit.attempts().len(), 1);
}

#[tokio::test]
async fn test_accept_without_elevation_shows_guidance() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, audit, spawned) = orchestrator(broken_registry(&binary), false, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Accept);

    let args: [&str; 0] = [];
    let resolved = orchestrator
        .handle_missing_registration(&args, &prompt)
        .await
        .unwrap();

    assert!(!resolved);
    assert!(prompt.elevation_shown.get());
    assert!(prompt.reported.borrow().is_empty());
    assert!(audit.attempts().is_empty());
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_decline_shows_instructions_and_is_audited() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, audit, spawned) = orchestrator(broken_registry(&binary), true, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Decline);

    let args: [&str; 0] = [];
    let resolved = orchestrator
        .handle_missing_registration(&args, &prompt)
        .await
        .unwrap();

    assert!(!resolved);
    assert_eq!(
        prompt.instructions_for.borrow().as_deref(),
        Some(binary.path())
    );
    let attempts = audit.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].mode, RegistrationMode::Declined);
    assert_eq!(attempts[0].outcome, RegistrationOutcome::Cancelled);
    assert_eq!(spawned.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_quit_is_audited_without_instructions() {
    let binary = NamedTempFile::new().unwrap();
    let (orchestrator, audit, _) = orchestrator(broken_registry(&binary), true, "exit 0");
    let prompt = ScriptedPrompt::answering(RepairChoice::Quit);

    let args: [&str; 0] = [];
    let resolved = orchestrator
        .handle_missing_registration(&args, &prompt)
        .await
        .unwrap();

    assert!(!resolved);
    assert!(prompt.instructions_for.borrow().is_none());
    assert_eq!(audit.attempts()[0].outcome, RegistrationOutcome::Cancelled);
}

#[cfg(unix)]
#[tokio::test]
async fn test_accepted_interactive_repair_resolves() {
    let temp_dir = TempDir::new().unwrap();
    let binary = NamedTempFile::new().unwrap();
    let marker = temp_dir.path().join("registered");
    let registry = Arc::new(MarkerRegistry {
        binary: binary.path().display().to_string(),
        marker: marker.clone(),
    });
    let script = format!("touch '{}'", marker.display());
    let (orchestrator, audit, _) = orchestrator(registry, true, &script);
    let prompt = ScriptedPrompt::answering(RepairChoice::Accept);

    let resolved = orchestrator
        .ensure_usable(&["rules", "list", "--silent"], &prompt)
        .await
        .unwrap();

    assert!(resolved);
    assert_eq!(prompt.asked.get(), 1);
    assert_eq!(audit.attempts()[0].mode, RegistrationMode::Interactive);
    assert_eq!(prompt.reported.borrow()[0].outcome, RegistrationOutcome::Success);
}
