//! Platform abstraction layer.
//!
//! Scope paths are always Windows paths, but the library builds and tests on
//! every host, so anything host-specific lives here:
//! - `paths` - Scope path normalization, env placeholders, user/machine identity
//! - `process` - Process liveness checks

pub mod paths;
pub mod process;

pub use paths::{
    current_user, expand_env_placeholders, machine_name, normalize_scope_path, paths_equal,
};
pub use process::is_process_alive;

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
