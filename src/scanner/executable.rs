//! Running-executable scanner.

use crate::core::types::{DetectionKind, DiscoveryStats, ProcessRecord};
use crate::scanner::process::{ProcessInfo, ProcessSource};
use crate::utils::path::{paths_equal, FolderPrefix};
use std::path::Path;

/// Finds processes whose main executable is at or under a path.
///
/// This scanner owns `processes_examined`; processes without a readable
/// executable path are passed over without counting as skipped.
pub struct ExecutableScanner<'a, P: ?Sized> {
    processes: &'a P,
}

impl<'a, P: ProcessSource + ?Sized> ExecutableScanner<'a, P> {
    pub fn new(processes: &'a P) -> Self {
        Self { processes }
    }

    /// Processes running an executable from under `folder`.
    pub fn scan_folder(&self, folder: &Path, stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        let prefix = FolderPrefix::new(folder);
        self.scan_matching(stats, |exe| prefix.contains(exe))
    }

    /// Processes running exactly the executable `file`.
    pub fn scan_exact(&self, file: &Path, stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        self.scan_matching(stats, |exe| paths_equal(exe, file))
    }

    fn scan_matching<F>(&self, stats: &mut DiscoveryStats, matches: F) -> Vec<ProcessRecord>
    where
        F: Fn(&Path) -> bool,
    {
        let processes = match self.processes.processes() {
            Ok(processes) => processes,
            Err(e) => {
                log::warn!("Process enumeration failed, skipping executable scan: {}", e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for info in &processes {
            stats.processes_examined += 1;

            let Some(exe) = info.path.as_deref() else {
                continue;
            };

            if matches(exe) {
                log::debug!("PID {} runs {}", info.pid, exe.display());
                records.push(running_record(info));
            }
        }

        records
    }
}

fn running_record(info: &ProcessInfo) -> ProcessRecord {
    ProcessRecord::new(info.pid, DetectionKind::RunningExecutable)
        .with_name(info.name.clone())
        .with_executable(info.path_string())
}
