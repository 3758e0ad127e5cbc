//! Process supervision: launch, liveness, termination, and status probes.
//!
//! Each session owns at most one [`SupervisedProcess`]. Launching validates
//! the executable path before spawning; termination is idempotent and
//! best-effort. Status probes are keyed by OS pid only and are independent
//! of session state.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{Pid, ProcessStatus as SysProcessStatus, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::process::{Child, Command};

/// Errors from launching the supervised application.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    ExecutableNotFound(PathBuf),
    #[error("failed to spawn process: {0}")]
    SpawnFailed(#[from] std::io::Error),
}

/// Errors from probing a process by OS pid.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no process found with pid {0}")]
    NotFound(u32),
    #[error("process {0} is not running")]
    NotRunning(u32),
}

/// Point-in-time status of a probed process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub pid: u32,
    /// Coarse scheduler state label (e.g. "Runnable", "Sleeping").
    pub status: String,
    /// CPU utilization sampled over a short interval, in percent.
    pub cpu_usage: f32,
    /// Resident set size in bytes.
    pub memory_usage: u64,
}

/// A launched external process owned by one session.
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: u32,
    executable: PathBuf,
    child: Child,
}

/// Launch the application at `executable` with whitespace-tokenized
/// `extra_args`, working directory set to the executable's parent, and
/// stdout/stderr discarded.
pub fn launch(executable: &Path, extra_args: &str) -> Result<SupervisedProcess, LaunchError> {
    if !executable.is_file() {
        return Err(LaunchError::ExecutableNotFound(executable.to_path_buf()));
    }
    let working_directory = executable.parent().unwrap_or_else(|| Path::new("."));

    let child = Command::new(executable)
        .args(extra_args.split_whitespace())
        .current_dir(working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    // id() is None only if the child has already been reaped, which cannot
    // happen before the first wait; treat it as a spawn failure anyway.
    let pid = child.id().ok_or_else(|| {
        LaunchError::SpawnFailed(std::io::Error::other("spawned process has no pid"))
    })?;

    tracing::info!(pid, executable = %executable.display(), "launched process");
    Ok(SupervisedProcess {
        pid,
        executable: executable.to_path_buf(),
        child,
    })
}

impl SupervisedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Whether the process is still running. An exited process stays in the
    /// session record for status reporting but no longer blocks a new launch.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Request graceful termination and wait for exit.
    ///
    /// Idempotent: a no-op if the process has already exited. Runs during
    /// best-effort cleanup, so failures are logged rather than returned.
    pub async fn terminate(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = self.pid, ?status, "process already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pid = self.pid, ?e, "failed to check process state");
                return;
            }
        }

        #[cfg(unix)]
        {
            // SIGTERM first so the application can shut down cleanly.
            let ret = unsafe { libc::kill(self.pid as i32, libc::SIGTERM) };
            if ret != 0 {
                tracing::warn!(pid = self.pid, "failed to send SIGTERM");
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = self.child.start_kill() {
                tracing::warn!(pid = self.pid, ?e, "failed to kill process");
                return;
            }
        }

        match self.child.wait().await {
            Ok(status) => tracing::info!(pid = self.pid, ?status, "process terminated"),
            Err(e) => tracing::warn!(pid = self.pid, ?e, "error waiting for process exit"),
        }
    }
}

/// Interval between the two CPU samples taken by [`probe`].
///
/// sysinfo needs two refreshes spaced by at least its minimum update
/// interval to compute a utilization delta; 100ms mirrors the original
/// service's sampling window.
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Probe a process by OS pid: liveness, CPU sample, resident memory, state.
///
/// The CPU sample blocks for [`CPU_SAMPLE_INTERVAL`], so the work runs on
/// the blocking thread pool and never stalls other sessions' message loops.
pub async fn probe(pid: u32) -> Result<ProcessStatus, ProbeError> {
    match tokio::task::spawn_blocking(move || probe_blocking(pid)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(pid, ?e, "status probe task failed");
            Err(ProbeError::NotFound(pid))
        }
    }
}

fn probe_blocking(pid: u32) -> Result<ProcessStatus, ProbeError> {
    let target = Pid::from_u32(pid);
    let mut system = System::new();

    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    let process = system.process(target).ok_or(ProbeError::NotFound(pid))?;
    if matches!(
        process.status(),
        SysProcessStatus::Zombie | SysProcessStatus::Dead
    ) {
        return Err(ProbeError::NotRunning(pid));
    }

    // Second refresh after a short interval yields the CPU delta.
    let interval = CPU_SAMPLE_INTERVAL.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    std::thread::sleep(interval);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    let process = system.process(target).ok_or(ProbeError::NotFound(pid))?;

    Ok(ProcessStatus {
        pid,
        status: process.status().to_string(),
        cpu_usage: process.cpu_usage(),
        memory_usage: process.memory(),
    })
}
