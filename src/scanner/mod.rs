//! Process discovery.
//!
//! This module finds the processes using a file or folder:
//! - Running executables located under the target
//! - Loaded modules (DLLs, shared objects) from under the target
//! - File locks reported by the platform lock registry
//!
//! [`Discovery`] runs the applicable scanners and merges their findings.

pub mod discovery;
pub mod executable;
pub mod file_lock;
pub mod lock;
pub mod module;
pub mod process;
#[cfg(test)]
pub mod testing;

pub use discovery::{dedup_records, Discovery, DiscoveryPass, PassState};
pub use executable::ExecutableScanner;
pub use file_lock::{CollectedFiles, FileLockScanner};
pub use lock::{LockRegistry, SystemLockRegistry};
pub use module::ModuleScanner;
pub use process::{ProcessEnumerator, ProcessInfo, ProcessSource};
