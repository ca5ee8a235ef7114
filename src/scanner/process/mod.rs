//! Live process enumeration.
//!
//! This module provides the process side of discovery:
//! - Process listing with name and executable path
//! - Loaded module listing per process
//! - Liveness checks used to confirm terminations

pub mod enumerate;
pub mod modules;

pub use enumerate::{ProcessEnumerator, ProcessInfo};

use crate::core::error::Result;
use std::path::PathBuf;

/// Source of live process state.
///
/// `processes` failing means nothing could be enumerated at all. Per-process
/// accessors report an inaccessible process as `None` or `Err` so callers can
/// skip it and move on.
pub trait ProcessSource {
    /// Enumerate all live processes.
    fn processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Look up a single process.
    fn process(&self, pid: u32) -> Option<ProcessInfo>;

    /// List the module paths a process has loaded, main executable included.
    fn modules(&self, pid: u32) -> Result<Vec<PathBuf>>;

    /// Whether the process is still running.
    fn is_alive(&self, pid: u32) -> bool {
        self.process(pid).is_some()
    }
}

impl<T: ProcessSource + ?Sized> ProcessSource for &T {
    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        (**self).processes()
    }

    fn process(&self, pid: u32) -> Option<ProcessInfo> {
        (**self).process(pid)
    }

    fn modules(&self, pid: u32) -> Result<Vec<PathBuf>> {
        (**self).modules(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        (**self).is_alive(pid)
    }
}
