//! Lock registry query client.

use super::{HolderList, LockHolder, LockRegistry, SessionGuard};
use crate::core::error::{Error, Result};
use crate::scanner::process::ProcessSource;
use std::path::PathBuf;

/// Fill attempts before a still-growing holder list counts as a protocol fault.
pub const FILL_ATTEMPTS: usize = 3;

/// How a single query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// The protocol ran to completion (possibly with zero holders)
    Complete,
    /// No session could be opened
    SessionUnavailable,
    /// The registry rejected the resources
    RegistrationFailed,
    /// Something unexpected happened after registration
    ProtocolFault,
}

/// A lock holder with its process details filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHolder {
    /// Process ID
    pub pid: u32,
    /// Process name, empty if unresolvable
    pub name: String,
    /// Executable path, empty if inaccessible
    pub executable_path: String,
}

/// Outcome of one query: holders found plus how the exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockQuery {
    pub holders: Vec<ResolvedHolder>,
    pub status: QueryStatus,
}

impl LockQuery {
    fn empty(status: QueryStatus) -> Self {
        Self {
            holders: Vec::new(),
            status,
        }
    }
}

/// Drives the registry protocol for one file or one batch of files.
pub struct LockQueryClient<'a, R: ?Sized, P: ?Sized> {
    registry: &'a R,
    processes: &'a P,
}

impl<'a, R, P> LockQueryClient<'a, R, P>
where
    R: LockRegistry + ?Sized,
    P: ProcessSource + ?Sized,
{
    /// Create a client over a registry, resolving holders through `processes`.
    pub fn new(registry: &'a R, processes: &'a P) -> Self {
        Self {
            registry,
            processes,
        }
    }

    /// Ask the registry which processes hold any of `paths`.
    ///
    /// Never fails: a missing session, rejected registration or zero holders
    /// all come back as an empty holder list, with `status` saying which.
    pub fn query(&self, paths: &[PathBuf]) -> LockQuery {
        if paths.is_empty() {
            return LockQuery::empty(QueryStatus::Complete);
        }

        let session = match SessionGuard::open(self.registry) {
            Ok(session) => session,
            Err(e) => {
                log::debug!("No lock registry session for {} file(s): {}", paths.len(), e);
                return LockQuery::empty(QueryStatus::SessionUnavailable);
            }
        };

        if let Err(e) = session.register(paths) {
            log::debug!(
                "Lock registry rejected {} file(s) starting at {:?}: {}",
                paths.len(),
                paths[0],
                e
            );
            return LockQuery::empty(QueryStatus::RegistrationFailed);
        }

        match negotiate(&session) {
            Ok(holders) => LockQuery {
                holders: holders
                    .into_iter()
                    .filter(|h| h.pid != 0)
                    .map(|h| self.resolve(h))
                    .collect(),
                status: QueryStatus::Complete,
            },
            Err(e) => {
                let level = if e.is_protocol_fault() {
                    log::Level::Warn
                } else {
                    log::Level::Debug
                };
                log::log!(
                    level,
                    "Lock registry query failed for {} file(s) starting at {:?}: {}",
                    paths.len(),
                    paths[0],
                    e
                );
                LockQuery::empty(QueryStatus::ProtocolFault)
            }
        }
    }

    /// Fill in name and executable path, falling back to what the registry said.
    fn resolve(&self, holder: LockHolder) -> ResolvedHolder {
        match self.processes.process(holder.pid) {
            Some(info) => {
                let executable_path = info.path_string();
                let name = if info.name.is_empty() {
                    holder.app_name
                } else {
                    info.name
                };
                ResolvedHolder {
                    pid: holder.pid,
                    name,
                    executable_path,
                }
            }
            None => ResolvedHolder {
                pid: holder.pid,
                name: holder.app_name,
                executable_path: String::new(),
            },
        }
    }
}

/// Run the size-then-fill exchange on an open, registered session.
fn negotiate<R: LockRegistry + ?Sized>(session: &SessionGuard<'_, R>) -> Result<Vec<LockHolder>> {
    let mut capacity = session.required_capacity()?;
    if capacity == 0 {
        return Ok(Vec::new());
    }

    for _ in 0..FILL_ATTEMPTS {
        match session.fill(capacity)? {
            HolderList::Complete(holders) => return Ok(holders),
            HolderList::NeedsCapacity(needed) => {
                log::trace!(
                    "Session {} holder list grew from {} to {}",
                    session.handle(),
                    capacity,
                    needed
                );
                capacity = needed;
            }
        }
    }

    Err(Error::lock_query(format!(
        "holder list still growing after {} attempts",
        FILL_ATTEMPTS
    )))
}
