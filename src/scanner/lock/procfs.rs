//! Lock registry backed by `/proc/<pid>/fd`.
//!
//! Linux has no lock registry service, so this one keeps session state in
//! process and answers holder queries by matching every process's open file
//! descriptors against the registered paths. It mirrors the Windows session
//! rules: a bounded number of concurrent sessions, explicit close, and a
//! fill call that reports a larger capacity when its buffer is too small.

use super::{HolderList, LockHolder, LockRegistry, SessionHandle};
use crate::core::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Concurrent session ceiling, matching the Windows service.
pub const MAX_SESSIONS: usize = 64;

const ERROR_INVALID_HANDLE: u32 = 6;
const ERROR_MAX_SESSIONS_REACHED: u32 = 353;

/// State of one open session.
#[derive(Debug, Default)]
struct Session {
    paths: HashSet<PathBuf>,
    /// Holders found by the size query, handed to the next fill
    snapshot: Option<Vec<LockHolder>>,
}

/// `/proc`-scanning lock registry.
#[derive(Debug, Default)]
pub struct ProcfsLockRegistry {
    sessions: Mutex<HashMap<SessionHandle, Session>>,
    next_handle: AtomicU32,
}

impl ProcfsLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_session<T>(
        &self,
        session: SessionHandle,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Result<T> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::Internal("lock registry sessions poisoned".to_string()))?;
        sessions
            .get_mut(&session)
            .map(f)
            .ok_or_else(|| Error::lock_query(format!("unknown session {}", session)))
    }
}

impl LockRegistry for ProcfsLockRegistry {
    fn start_session(&self) -> Result<SessionHandle> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::LockSession { code: ERROR_INVALID_HANDLE })?;
        if sessions.len() >= MAX_SESSIONS {
            return Err(Error::LockSession {
                code: ERROR_MAX_SESSIONS_REACHED,
            });
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        sessions.insert(handle, Session::default());
        Ok(handle)
    }

    fn register_resources(&self, session: SessionHandle, paths: &[PathBuf]) -> Result<()> {
        let mut sessions = self.sessions.lock().map_err(|_| Error::LockRegistration {
            count: paths.len(),
            code: ERROR_INVALID_HANDLE,
        })?;
        let registered = sessions.get_mut(&session).ok_or(Error::LockRegistration {
            count: paths.len(),
            code: ERROR_INVALID_HANDLE,
        })?;
        registered.paths.extend(paths.iter().cloned());
        registered.snapshot = None;
        Ok(())
    }

    fn required_capacity(&self, session: SessionHandle) -> Result<usize> {
        self.with_session(session, |s| {
            let holders = scan_holders(&s.paths);
            let needed = holders.len();
            s.snapshot = Some(holders);
            needed
        })
    }

    /// Answers from the size query's walk when there was one, so a query
    /// costs a single pass over `/proc`.
    fn fill_holders(&self, session: SessionHandle, capacity: usize) -> Result<HolderList> {
        self.with_session(session, |s| {
            let holders = s.snapshot.take().unwrap_or_else(|| scan_holders(&s.paths));
            if holders.len() > capacity {
                let needed = holders.len();
                s.snapshot = Some(holders);
                HolderList::NeedsCapacity(needed)
            } else {
                HolderList::Complete(holders)
            }
        })
    }

    fn end_session(&self, session: SessionHandle) -> Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| Error::Internal("lock registry sessions poisoned".to_string()))?;
        sessions
            .remove(&session)
            .map(|_| ())
            .ok_or_else(|| Error::lock_query(format!("unknown session {}", session)))
    }
}

/// Every process with an open descriptor on a registered path, in PID order.
fn scan_holders(registered: &HashSet<PathBuf>) -> Vec<LockHolder> {
    if registered.is_empty() {
        return Vec::new();
    }

    let Ok(entries) = fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut pids: Vec<u32> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().to_string_lossy().parse::<u32>().ok())
        .collect();
    pids.sort_unstable();

    pids.into_iter()
        .filter(|&pid| holds_any(pid, registered))
        .map(|pid| {
            let name = fs::read_to_string(format!("/proc/{}/comm", pid))
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            LockHolder::new(pid, name)
        })
        .collect()
}

/// Whether `pid` has a descriptor open on any registered path.
///
/// Other users' descriptor tables are unreadable without privilege; those
/// processes are silently passed over.
fn holds_any(pid: u32, registered: &HashSet<PathBuf>) -> bool {
    let Ok(fds) = fs::read_dir(format!("/proc/{}/fd", pid)) else {
        return false;
    };

    fds.filter_map(|fd| fd.ok())
        .filter_map(|fd| fs::read_link(fd.path()).ok())
        .map(crate::scanner::process::enumerate::strip_deleted_suffix)
        .any(|target| registered.contains(&target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_detects_own_open_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("held.txt");
        let _handle = File::create(&path).unwrap();

        let registry = ProcfsLockRegistry::new();
        let session = registry.start_session().unwrap();
        registry.register_resources(session, &[path.clone()]).unwrap();

        let needed = registry.required_capacity(session).unwrap();
        assert!(needed >= 1);

        match registry.fill_holders(session, needed + 4).unwrap() {
            HolderList::Complete(holders) => {
                assert!(holders.iter().any(|h| h.pid == std::process::id()));
            }
            HolderList::NeedsCapacity(n) => panic!("unexpected growth to {}", n),
        }

        registry.end_session(session).unwrap();
    }

    #[test]
    fn test_fill_with_zero_capacity_reports_need() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("held.txt");
        let _handle = File::create(&path).unwrap();

        let registry = ProcfsLockRegistry::new();
        let session = registry.start_session().unwrap();
        registry.register_resources(session, &[path]).unwrap();

        assert!(matches!(
            registry.fill_holders(session, 0).unwrap(),
            HolderList::NeedsCapacity(n) if n >= 1
        ));
        registry.end_session(session).unwrap();
    }

    #[test]
    fn test_fill_reuses_size_query_walk() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("held.txt");
        let handle = File::create(&path).unwrap();

        let registry = ProcfsLockRegistry::new();
        let session = registry.start_session().unwrap();
        registry.register_resources(session, &[path]).unwrap();
        let needed = registry.required_capacity(session).unwrap();

        // Closed after sizing; the fill still sees the holder set it was sized for.
        drop(handle);
        match registry.fill_holders(session, needed).unwrap() {
            HolderList::Complete(holders) => {
                assert_eq!(holders.len(), needed);
                assert!(holders.iter().any(|h| h.pid == std::process::id()));
            }
            HolderList::NeedsCapacity(n) => panic!("unexpected growth to {}", n),
        }
        registry.end_session(session).unwrap();
    }

    #[test]
    fn test_fill_after_need_uses_reported_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("held.txt");
        let handle = File::create(&path).unwrap();

        let registry = ProcfsLockRegistry::new();
        let session = registry.start_session().unwrap();
        registry.register_resources(session, &[path]).unwrap();

        let needed = match registry.fill_holders(session, 0).unwrap() {
            HolderList::NeedsCapacity(n) => n,
            HolderList::Complete(_) => panic!("expected a capacity request"),
        };
        drop(handle);
        assert!(matches!(
            registry.fill_holders(session, needed).unwrap(),
            HolderList::Complete(holders) if holders.len() == needed
        ));
        registry.end_session(session).unwrap();
    }

    #[test]
    fn test_unheld_file_has_no_holders() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("idle.txt");
        fs::write(&path, b"x").unwrap();

        let registry = ProcfsLockRegistry::new();
        let session = registry.start_session().unwrap();
        registry.register_resources(session, &[path]).unwrap();
        assert_eq!(registry.required_capacity(session).unwrap(), 0);
        registry.end_session(session).unwrap();
    }

    #[test]
    fn test_session_ceiling() {
        let registry = ProcfsLockRegistry::new();
        let handles: Vec<_> = (0..MAX_SESSIONS)
            .map(|_| registry.start_session().unwrap())
            .collect();

        assert!(matches!(
            registry.start_session(),
            Err(Error::LockSession {
                code: ERROR_MAX_SESSIONS_REACHED
            })
        ));

        registry.end_session(handles[0]).unwrap();
        assert!(registry.start_session().is_ok());
    }

    #[test]
    fn test_unknown_session() {
        let registry = ProcfsLockRegistry::new();
        assert!(registry
            .register_resources(99, &[PathBuf::from("/tmp/x")])
            .is_err());
        assert!(registry.end_session(99).is_err());
    }
}
