//! In-memory doubles for the process, lock registry and kill seams.

use crate::actions::terminate::ProcessKiller;
use crate::core::error::{Error, Result};
use crate::scanner::lock::{HolderList, LockHolder, LockRegistry, SessionHandle};
use crate::scanner::process::{ProcessInfo, ProcessSource};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Protocol step at which a [`FakeLockRegistry`] misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Start,
    Register,
    Capacity,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Fail,
    Panic,
}

/// Lock registry double that records every call.
#[derive(Default)]
pub struct FakeLockRegistry {
    locks: Vec<(PathBuf, LockHolder)>,
    late_locks: Vec<(PathBuf, LockHolder)>,
    fault: Option<(Step, Fault)>,
    grow_forever: bool,
    sessions: Mutex<HashMap<SessionHandle, Vec<PathBuf>>>,
    registered: Mutex<Vec<Vec<PathBuf>>>,
    next_handle: AtomicUsize,
    start_calls: AtomicUsize,
    capacity_calls: AtomicUsize,
    fill_calls: AtomicUsize,
    end_calls: AtomicUsize,
}

impl FakeLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `pid` holds `path` open.
    pub fn with_lock(mut self, path: &str, pid: u32, app_name: &str) -> Self {
        self.locks
            .push((PathBuf::from(path), LockHolder::new(pid, app_name)));
        self
    }

    /// `pid` grabs `path` between the size query and the fill query.
    pub fn with_late_lock(mut self, path: &str, pid: u32, app_name: &str) -> Self {
        self.late_locks
            .push((PathBuf::from(path), LockHolder::new(pid, app_name)));
        self
    }

    pub fn fail_at(mut self, step: Step) -> Self {
        self.fault = Some((step, Fault::Fail));
        self
    }

    pub fn panic_at(mut self, step: Step) -> Self {
        self.fault = Some((step, Fault::Panic));
        self
    }

    /// Every fill reports one more holder than it was given room for.
    pub fn always_grow(mut self) -> Self {
        self.grow_forever = true;
        self
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn fill_calls(&self) -> usize {
        self.fill_calls.load(Ordering::SeqCst)
    }

    pub fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Path lists in the order they were registered.
    pub fn registered(&self) -> Vec<Vec<PathBuf>> {
        self.registered.lock().unwrap().clone()
    }

    fn trip(&self, step: Step) -> Result<()> {
        match self.fault {
            Some((s, Fault::Fail)) if s == step => Err(match step {
                Step::Start => Error::LockSession { code: 5 },
                Step::Register => Error::LockRegistration { count: 1, code: 87 },
                Step::Capacity | Step::Fill => Error::lock_query("simulated fault"),
            }),
            Some((s, Fault::Panic)) if s == step => panic!("simulated panic at {:?}", step),
            _ => Ok(()),
        }
    }

    fn holders_for(&self, session: SessionHandle, include_late: bool) -> Result<Vec<LockHolder>> {
        let sessions = self.sessions.lock().unwrap();
        let paths = sessions
            .get(&session)
            .ok_or_else(|| Error::lock_query("unknown session"))?;

        let mut seen = HashSet::new();
        let late: &[(PathBuf, LockHolder)] = if include_late { &self.late_locks } else { &[] };
        Ok(self
            .locks
            .iter()
            .chain(late.iter())
            .filter(|(path, _)| paths.contains(path))
            .filter(|(_, holder)| seen.insert(holder.pid))
            .map(|(_, holder)| holder.clone())
            .collect())
    }
}

impl LockRegistry for FakeLockRegistry {
    fn start_session(&self) -> Result<SessionHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.trip(Step::Start)?;
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) as SessionHandle + 1;
        self.sessions.lock().unwrap().insert(handle, Vec::new());
        Ok(handle)
    }

    fn register_resources(&self, session: SessionHandle, paths: &[PathBuf]) -> Result<()> {
        self.trip(Step::Register)?;
        self.registered.lock().unwrap().push(paths.to_vec());
        let mut sessions = self.sessions.lock().unwrap();
        let registered = sessions
            .get_mut(&session)
            .ok_or(Error::LockRegistration {
                count: paths.len(),
                code: 6,
            })?;
        registered.extend_from_slice(paths);
        Ok(())
    }

    fn required_capacity(&self, session: SessionHandle) -> Result<usize> {
        self.trip(Step::Capacity)?;
        let first = self.capacity_calls.fetch_add(1, Ordering::SeqCst) == 0;
        Ok(self.holders_for(session, !first)?.len())
    }

    fn fill_holders(&self, session: SessionHandle, capacity: usize) -> Result<HolderList> {
        self.fill_calls.fetch_add(1, Ordering::SeqCst);
        self.trip(Step::Fill)?;
        if self.grow_forever {
            return Ok(HolderList::NeedsCapacity(capacity + 1));
        }
        let holders = self.holders_for(session, true)?;
        if holders.len() > capacity {
            Ok(HolderList::NeedsCapacity(holders.len()))
        } else {
            Ok(HolderList::Complete(holders))
        }
    }

    fn end_session(&self, session: SessionHandle) -> Result<()> {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().unwrap().remove(&session) {
            Some(_) => Ok(()),
            None => Err(Error::lock_query("unknown session")),
        }
    }
}

/// Process source double with a shared "killed" set.
#[derive(Default)]
pub struct FakeProcessSource {
    processes: Vec<ProcessInfo>,
    modules: HashMap<u32, Vec<PathBuf>>,
    denied_modules: HashSet<u32>,
    unopenable: HashSet<u32>,
    enumeration_fails: bool,
    killed: Arc<Mutex<HashSet<u32>>>,
}

impl FakeProcessSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, info: ProcessInfo) -> Self {
        self.processes.push(info);
        self
    }

    pub fn with_modules(mut self, pid: u32, modules: &[&str]) -> Self {
        self.modules
            .insert(pid, modules.iter().map(PathBuf::from).collect());
        self
    }

    /// Module listing for `pid` fails as if access were denied.
    pub fn deny_modules(mut self, pid: u32) -> Self {
        self.denied_modules.insert(pid);
        self
    }

    /// `pid` is listed by enumeration but cannot be opened on its own.
    pub fn unopenable(mut self, pid: u32) -> Self {
        self.unopenable.insert(pid);
        self
    }

    /// System-wide enumeration fails outright.
    pub fn failing(mut self) -> Self {
        self.enumeration_fails = true;
        self
    }

    /// A killer whose successful kills remove processes from this source.
    pub fn killer(&self) -> FakeKiller {
        FakeKiller {
            killed: Arc::clone(&self.killed),
            stubborn: HashSet::new(),
            denied: HashSet::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn alive(&self) -> impl Iterator<Item = &ProcessInfo> {
        let killed = self.killed.lock().unwrap().clone();
        self.processes
            .iter()
            .filter(move |p| !killed.contains(&p.pid))
    }
}

impl ProcessSource for FakeProcessSource {
    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        if self.enumeration_fails {
            return Err(Error::ProcessEnumeration("simulated".to_string()));
        }
        Ok(self.alive().cloned().collect())
    }

    fn process(&self, pid: u32) -> Option<ProcessInfo> {
        if self.unopenable.contains(&pid) {
            return None;
        }
        self.alive().find(|p| p.pid == pid).cloned()
    }

    fn modules(&self, pid: u32) -> Result<Vec<PathBuf>> {
        if self.denied_modules.contains(&pid) {
            return Err(Error::process_access(pid, "access denied"));
        }
        Ok(self.modules.get(&pid).cloned().unwrap_or_default())
    }
}

/// Kill double paired with a [`FakeProcessSource`].
pub struct FakeKiller {
    killed: Arc<Mutex<HashSet<u32>>>,
    stubborn: HashSet<u32>,
    denied: HashSet<u32>,
    requests: Mutex<Vec<u32>>,
}

impl FakeKiller {
    /// The kill call succeeds but the process keeps running.
    pub fn stubborn(mut self, pid: u32) -> Self {
        self.stubborn.insert(pid);
        self
    }

    /// The kill call is refused.
    pub fn denied(mut self, pid: u32) -> Self {
        self.denied.insert(pid);
        self
    }

    /// PIDs a kill was requested for, in order.
    pub fn requests(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProcessKiller for FakeKiller {
    fn kill(&self, pid: u32) -> Result<()> {
        self.requests.lock().unwrap().push(pid);
        if self.denied.contains(&pid) {
            return Err(Error::ProcessTermination {
                pid,
                reason: "Access is denied.".to_string(),
            });
        }
        if !self.stubborn.contains(&pid) {
            self.killed.lock().unwrap().insert(pid);
        }
        Ok(())
    }
}
