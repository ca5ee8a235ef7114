//! File-lock scanner.

use crate::core::config::{DiscoveryConfig, LockQueryMode, MAX_BATCH_SIZE};
use crate::core::types::{DetectionKind, DiscoveryStats, ProcessRecord, Target, TargetKind};
use crate::scanner::lock::{LockQuery, LockQueryClient, LockRegistry, QueryStatus};
use crate::scanner::process::ProcessSource;
use crate::utils::path::display_path;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files gathered under a folder target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedFiles {
    /// Regular files, in walk order
    pub files: Vec<PathBuf>,
    /// Whether more files existed past the cap
    pub truncated: bool,
}

/// Asks the lock registry about every file under a target.
pub struct FileLockScanner<'a, R: ?Sized, P: ?Sized> {
    client: LockQueryClient<'a, R, P>,
    mode: LockQueryMode,
    batch_size: usize,
    max_files: usize,
    follow_symlinks: bool,
}

impl<'a, R, P> FileLockScanner<'a, R, P>
where
    R: LockRegistry + ?Sized,
    P: ProcessSource + ?Sized,
{
    /// Create a scanner with settings taken from `config`.
    pub fn new(registry: &'a R, processes: &'a P, config: &DiscoveryConfig) -> Self {
        Self {
            client: LockQueryClient::new(registry, processes),
            mode: config.lock_query_mode,
            batch_size: config.batch_size.clamp(1, MAX_BATCH_SIZE),
            max_files: config.max_files,
            follow_symlinks: config.follow_symlinks,
        }
    }

    /// Find lock holders for a file target or every file under a folder target.
    pub fn scan(&self, target: &Target, stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        let files = match target.kind {
            TargetKind::File => vec![target.path.clone()],
            TargetKind::Folder => {
                let collected = self.collect_files(&target.path);
                if collected.truncated {
                    log::info!(
                        "Stopped enumerating {} at {} files",
                        target.path.display(),
                        self.max_files
                    );
                }
                stats.files_truncated |= collected.truncated;
                collected.files
            }
        };
        stats.files_enumerated += files.len() as u64;

        let records = match (target.kind, self.mode) {
            (TargetKind::File, _) | (TargetKind::Folder, LockQueryMode::PerFile) => {
                self.query_per_file(&files, stats)
            }
            (TargetKind::Folder, LockQueryMode::Batched) => self.query_batched(&files, stats),
        };

        log::debug!(
            "{} lock queries over {} files found {} holder record(s)",
            stats.lock_queries,
            files.len(),
            records.len()
        );
        records
    }

    /// Walk `folder` for regular files, stopping at the configured cap.
    ///
    /// Unreadable subtrees are skipped; whatever was reachable is returned.
    pub fn collect_files(&self, folder: &Path) -> CollectedFiles {
        let mut collected = CollectedFiles::default();

        let walker = WalkDir::new(folder)
            .follow_links(self.follow_symlinks)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::trace!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if collected.files.len() >= self.max_files {
                collected.truncated = true;
                break;
            }
            collected.files.push(entry.into_path());
        }

        collected
    }

    fn query_per_file(&self, files: &[PathBuf], stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        let mut records = Vec::new();
        for file in files {
            let query = self.run(std::slice::from_ref(file), stats);
            let resource = display_path(file);
            records.extend(lock_records(query, &resource));
        }
        records
    }

    fn query_batched(&self, files: &[PathBuf], stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        let mut records = Vec::new();
        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            let query = self.run(batch, stats);
            let resource = batch_resource(batch, index + 1);
            records.extend(lock_records(query, &resource));
        }
        records
    }

    fn run(&self, files: &[PathBuf], stats: &mut DiscoveryStats) -> LockQuery {
        stats.lock_queries += 1;
        let query = self.client.query(files);
        match query.status {
            QueryStatus::Complete => {}
            QueryStatus::SessionUnavailable => stats.sessions_unavailable += 1,
            QueryStatus::RegistrationFailed => stats.registrations_failed += 1,
            QueryStatus::ProtocolFault => stats.protocol_faults += 1,
        }
        query
    }
}

/// What a batched hit can say about which file is held.
fn batch_resource(batch: &[PathBuf], number: usize) -> String {
    match batch {
        [single] => display_path(single),
        [first, ..] => format!(
            "one of {} files in batch {} (first: {})",
            batch.len(),
            number,
            first.display()
        ),
        [] => String::new(),
    }
}

fn lock_records(query: LockQuery, resource: &str) -> impl Iterator<Item = ProcessRecord> + '_ {
    query.holders.into_iter().map(move |holder| {
        ProcessRecord::new(holder.pid, DetectionKind::FileLock)
            .with_name(holder.name)
            .with_executable(holder.executable_path)
            .with_resource(resource)
    })
}
