//! Supervised execution of the registration repair tool.

use crate::config::RegistrationConfig;
use crate::error::{IndexScopeError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// How long to keep draining stderr after the child is gone.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// A fully resolved command line for one repair run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Builds the command that re-registers the access point binary.
pub trait RepairCommand: Send + Sync {
    /// Short name recorded in the audit trail.
    fn method(&self) -> &str;

    fn invocation(&self, binary: &Path, silent: bool) -> RepairInvocation;
}

/// `regsvr32 [/s] <binary>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Regsvr32;

impl RepairCommand for Regsvr32 {
    fn method(&self) -> &str {
        RegistrationConfig::REPAIR_METHOD
    }

    fn invocation(&self, binary: &Path, silent: bool) -> RepairInvocation {
        let mut args = Vec::with_capacity(2);
        if silent {
            args.push("/s".to_string());
        }
        args.push(binary.display().to_string());
        RepairInvocation {
            program: PathBuf::from(RegistrationConfig::REPAIR_PROGRAM),
            args,
        }
    }
}

/// What happened to the child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairExit {
    /// Exited on its own. `None` when terminated by a signal.
    Exited(Option<i32>),
    /// Killed after exceeding the timeout.
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct RepairOutput {
    pub exit: RepairExit,
    pub pid: Option<u32>,
    pub stderr: String,
}

/// Spawn `invocation`, wait at most `timeout`, and kill it if it overruns.
///
/// Only a failure to spawn is returned as an error; everything after that is
/// described by [`RepairOutput`].
pub async fn run_repair(invocation: &RepairInvocation, timeout: Duration) -> Result<RepairOutput> {
    debug!(
        "Spawning repair: {} {}",
        invocation.program.display(),
        invocation.args.join(" ")
    );

    let mut child = Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| IndexScopeError::io_with_path(e, &invocation.program))?;

    let pid = child.id();
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            loop {
                match reader.next_line().await {
                    Ok(Some(line)) => {
                        debug!("repair stderr: {}", line);
                        collected.push(line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error reading repair stderr: {}", e);
                        break;
                    }
                }
            }
            collected.join("\n")
        })
    });

    let exit = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => RepairExit::Exited(status.code()),
        Ok(Err(e)) => {
            warn!("Failed waiting for repair process: {}", e);
            RepairExit::Exited(None)
        }
        Err(_) => {
            warn!(
                "Repair process {:?} exceeded {:?}, terminating",
                pid, timeout
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to terminate repair process: {}", e);
            }
            RepairExit::TimedOut
        }
    };

    let stderr = match stderr_task {
        Some(task) => match tokio::time::timeout(STDERR_DRAIN_GRACE, task).await {
            Ok(Ok(text)) => text,
            _ => String::new(),
        },
        None => String::new(),
    };

    Ok(RepairOutput { exit, pid, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regsvr32_invocation() {
        let binary = Path::new(r"C:\Windows\System32\SearchAPI.dll");
        let silent = Regsvr32.invocation(binary, true);
        assert_eq!(silent.program, PathBuf::from("regsvr32.exe"));
        assert_eq!(silent.args, vec!["/s".to_string(), binary.display().to_string()]);

        let loud = Regsvr32.invocation(binary, false);
        assert_eq!(loud.args.len(), 1);
        assert_eq!(Regsvr32.method(), "regsvr32");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let invocation = RepairInvocation {
            program: PathBuf::from("/definitely/not/a/program"),
            args: Vec::new(),
        };
        assert!(run_repair(&invocation, Duration::from_secs(1)).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_and_stderr_are_captured() {
        let invocation = RepairInvocation {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), "echo broken >&2; exit 3".into()],
        };
        let output = run_repair(&invocation, Duration::from_secs(5)).await.unwrap();
        assert_eq!(output.exit, RepairExit::Exited(Some(3)));
        assert_eq!(output.stderr, "broken");
    }
}
