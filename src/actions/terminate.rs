//! Forceful process termination with post-hoc verification.

use crate::core::error::{Error, Result};
use crate::core::types::TerminationOutcome;
use crate::scanner::process::{ProcessEnumerator, ProcessSource};
use std::collections::HashSet;
use std::time::Duration;

/// Default wait between issuing kills and checking who is still alive.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(500);

/// Issues a forceful termination request for one process.
///
/// `Ok` only means the request was accepted; whether the process actually
/// went away is checked separately.
pub trait ProcessKiller {
    fn kill(&self, pid: u32) -> Result<()>;
}

impl<T: ProcessKiller + ?Sized> ProcessKiller for &T {
    fn kill(&self, pid: u32) -> Result<()> {
        (**self).kill(pid)
    }
}

/// Kills processes through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKiller;

impl SystemKiller {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessKiller for SystemKiller {
    #[cfg(target_os = "windows")]
    fn kill(&self, pid: u32) -> Result<()> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(|e| {
                Error::ProcessTermination {
                    pid,
                    reason: e.message().to_string(),
                }
            })?;
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            result.map_err(|e| Error::ProcessTermination {
                pid,
                reason: e.message().to_string(),
            })
        }
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> Result<()> {
        use std::process::Command;

        let output = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .output()
            .map_err(|e| Error::ProcessTermination {
                pid,
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::ProcessTermination {
                pid,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    #[cfg(not(any(target_os = "windows", unix)))]
    fn kill(&self, _pid: u32) -> Result<()> {
        Err(Error::NotSupported(
            "Process termination not supported on this platform".to_string(),
        ))
    }
}

/// Terminates a set of processes and reports, per process, whether it is gone.
pub struct Terminator<P = ProcessEnumerator, K = SystemKiller> {
    processes: P,
    killer: K,
    grace_delay: Duration,
}

impl Terminator {
    /// Terminator over the live system.
    pub fn system(grace_delay: Duration) -> Self {
        Self::new(ProcessEnumerator::new(), SystemKiller::new()).with_grace_delay(grace_delay)
    }
}

impl<P: ProcessSource, K: ProcessKiller> Terminator<P, K> {
    pub fn new(processes: P, killer: K) -> Self {
        Self {
            processes,
            killer,
            grace_delay: DEFAULT_GRACE_DELAY,
        }
    }

    pub fn with_grace_delay(mut self, grace_delay: Duration) -> Self {
        self.grace_delay = grace_delay;
        self
    }

    /// Terminate every process in `pids`.
    ///
    /// Repeated identifiers collapse to their first occurrence. The result has
    /// one outcome per distinct identifier, in input order, and a failure for
    /// one process never stops attempts on the others.
    pub fn terminate(&self, pids: &[u32]) -> Vec<TerminationOutcome> {
        let mut seen = HashSet::with_capacity(pids.len());
        let pids: Vec<u32> = pids.iter().copied().filter(|pid| seen.insert(*pid)).collect();
        if pids.is_empty() {
            return Vec::new();
        }

        let own_pid = std::process::id();
        let live_before = self.live_set();
        let mut outcomes: Vec<Option<TerminationOutcome>> = Vec::with_capacity(pids.len());
        let mut requested = false;

        for &pid in &pids {
            let early = if pid == own_pid {
                Some(TerminationOutcome::failed(pid, "refusing to terminate this process"))
            } else if !self.is_listed(&live_before, pid) {
                Some(TerminationOutcome::failed(pid, "process not found"))
            } else {
                match self.killer.kill(pid) {
                    Ok(()) => {
                        log::info!("Requested termination of PID {}", pid);
                        requested = true;
                        None
                    }
                    Err(e) => {
                        log::warn!("Termination of PID {} failed: {}", pid, e);
                        Some(TerminationOutcome::failed(pid, kill_failure_detail(&e)))
                    }
                }
            };
            outcomes.push(early);
        }

        if requested && !self.grace_delay.is_zero() {
            std::thread::sleep(self.grace_delay);
        }

        let live_after = if requested { self.live_set() } else { live_before };
        pids.iter()
            .zip(outcomes)
            .map(|(&pid, early)| {
                early.unwrap_or_else(|| {
                    if self.is_listed(&live_after, pid) {
                        log::warn!("PID {} is still running after termination request", pid);
                        TerminationOutcome::failed(
                            pid,
                            "process still running after termination request \
                             (insufficient privilege?)",
                        )
                    } else {
                        TerminationOutcome::succeeded(pid)
                    }
                })
            })
            .collect()
    }

    /// Whether `pid` is live, per `snapshot` when there is one.
    ///
    /// The snapshot lists processes the caller may be unable to open, which
    /// a per-process lookup would miss.
    fn is_listed(&self, snapshot: &Option<HashSet<u32>>, pid: u32) -> bool {
        match snapshot {
            Some(live) => live.contains(&pid),
            None => self.processes.is_alive(pid),
        }
    }

    /// One snapshot of live PIDs, or `None` if enumeration failed.
    fn live_set(&self) -> Option<HashSet<u32>> {
        match self.processes.processes() {
            Ok(processes) => Some(processes.into_iter().map(|p| p.pid).collect()),
            Err(e) => {
                log::debug!("Falling back to per-process liveness checks: {}", e);
                None
            }
        }
    }
}

fn kill_failure_detail(error: &Error) -> String {
    let detail = match error {
        Error::ProcessTermination { reason, .. } if !reason.is_empty() => reason.clone(),
        other => other.to_string(),
    };
    match error.suggestion() {
        Some(hint) => format!("{} ({})", detail, hint),
        None => detail,
    }
}
