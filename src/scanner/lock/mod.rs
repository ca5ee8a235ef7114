//! Resource-lock registry access.
//!
//! The registry answers "which processes hold these files open" through a
//! session protocol: open a session, register the files, ask how many holders
//! there are, then fetch exactly that many. [`LockRegistry`] exposes each step
//! as a typed call; [`SessionGuard`] ties the session's lifetime to a scope;
//! [`LockQueryClient`] drives the whole exchange for one file or one batch.

pub mod client;
#[cfg(target_os = "linux")]
pub mod procfs;
#[cfg(target_os = "windows")]
pub mod restart_manager;

pub use client::{LockQuery, LockQueryClient, QueryStatus, ResolvedHolder};

use crate::core::error::{Error, Result};
use std::path::PathBuf;

/// Opaque session handle issued by a registry.
pub type SessionHandle = u32;

/// A process the registry reports as holding a registered resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    /// Process ID; 0 is a protocol artifact, not a process
    pub pid: u32,
    /// Application name as the registry reports it
    pub app_name: String,
}

impl LockHolder {
    pub fn new(pid: u32, app_name: impl Into<String>) -> Self {
        Self {
            pid,
            app_name: app_name.into(),
        }
    }
}

/// Result of the second, buffer-filling query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderList {
    /// The buffer was large enough
    Complete(Vec<LockHolder>),
    /// The holder count grew since the size query
    NeedsCapacity(usize),
}

/// The platform resource-lock registry.
pub trait LockRegistry {
    /// Open a new session.
    fn start_session(&self) -> Result<SessionHandle>;

    /// Register file paths as resources of interest.
    fn register_resources(&self, session: SessionHandle, paths: &[PathBuf]) -> Result<()>;

    /// First phase: how many holder entries the fill call needs room for.
    fn required_capacity(&self, session: SessionHandle) -> Result<usize>;

    /// Second phase: fill a buffer of `capacity` entries.
    fn fill_holders(&self, session: SessionHandle, capacity: usize) -> Result<HolderList>;

    /// Close a session.
    fn end_session(&self, session: SessionHandle) -> Result<()>;
}

impl<T: LockRegistry + ?Sized> LockRegistry for &T {
    fn start_session(&self) -> Result<SessionHandle> {
        (**self).start_session()
    }

    fn register_resources(&self, session: SessionHandle, paths: &[PathBuf]) -> Result<()> {
        (**self).register_resources(session, paths)
    }

    fn required_capacity(&self, session: SessionHandle) -> Result<usize> {
        (**self).required_capacity(session)
    }

    fn fill_holders(&self, session: SessionHandle, capacity: usize) -> Result<HolderList> {
        (**self).fill_holders(session, capacity)
    }

    fn end_session(&self, session: SessionHandle) -> Result<()> {
        (**self).end_session(session)
    }
}

/// An open registry session, closed when dropped.
///
/// Dropping runs on every exit path, unwinding included, so a session can
/// never outlive the query that opened it.
pub struct SessionGuard<'r, R: LockRegistry + ?Sized> {
    registry: &'r R,
    handle: SessionHandle,
}

impl<'r, R: LockRegistry + ?Sized> SessionGuard<'r, R> {
    /// Open a session on `registry`.
    pub fn open(registry: &'r R) -> Result<Self> {
        let handle = registry.start_session()?;
        log::trace!("Lock registry session {} opened", handle);
        Ok(Self { registry, handle })
    }

    /// The raw session handle.
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn register(&self, paths: &[PathBuf]) -> Result<()> {
        self.registry.register_resources(self.handle, paths)
    }

    pub fn required_capacity(&self) -> Result<usize> {
        self.registry.required_capacity(self.handle)
    }

    pub fn fill(&self, capacity: usize) -> Result<HolderList> {
        self.registry.fill_holders(self.handle, capacity)
    }
}

impl<R: LockRegistry + ?Sized> Drop for SessionGuard<'_, R> {
    fn drop(&mut self) {
        match self.registry.end_session(self.handle) {
            Ok(()) => log::trace!("Lock registry session {} closed", self.handle),
            Err(e) => log::debug!("Closing lock registry session {} failed: {}", self.handle, e),
        }
    }
}

/// Registry stand-in for platforms without a lock registry.
///
/// Every session open fails, which discovery treats as "no findings".
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRegistry;

impl LockRegistry for UnavailableRegistry {
    fn start_session(&self) -> Result<SessionHandle> {
        Err(Error::LockSession { code: 0 })
    }

    fn register_resources(&self, _session: SessionHandle, paths: &[PathBuf]) -> Result<()> {
        Err(Error::LockRegistration {
            count: paths.len(),
            code: 0,
        })
    }

    fn required_capacity(&self, _session: SessionHandle) -> Result<usize> {
        Err(Error::NotSupported("lock registry".to_string()))
    }

    fn fill_holders(&self, _session: SessionHandle, _capacity: usize) -> Result<HolderList> {
        Err(Error::NotSupported("lock registry".to_string()))
    }

    fn end_session(&self, _session: SessionHandle) -> Result<()> {
        Ok(())
    }
}

/// The lock registry for the current platform.
#[cfg(target_os = "windows")]
pub type SystemLockRegistry = restart_manager::RestartManager;

/// The lock registry for the current platform.
#[cfg(target_os = "linux")]
pub type SystemLockRegistry = procfs::ProcfsLockRegistry;

/// The lock registry for the current platform.
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub type SystemLockRegistry = UnavailableRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::testing::{FakeLockRegistry, Step};

    #[test]
    fn test_guard_closes_on_drop() {
        let registry = FakeLockRegistry::new();
        {
            let guard = SessionGuard::open(&registry).unwrap();
            assert_eq!(registry.open_sessions(), 1);
            guard.register(&[PathBuf::from("/a")]).unwrap();
        }
        assert_eq!(registry.open_sessions(), 0);
        assert_eq!(registry.end_calls(), 1);
    }

    #[test]
    fn test_guard_not_created_when_open_fails() {
        let registry = FakeLockRegistry::new().fail_at(Step::Start);
        assert!(SessionGuard::open(&registry).is_err());
        assert_eq!(registry.end_calls(), 0);
    }

    #[test]
    fn test_unavailable_registry() {
        let registry = UnavailableRegistry;
        assert!(matches!(
            registry.start_session(),
            Err(Error::LockSession { .. })
        ));
    }
}
