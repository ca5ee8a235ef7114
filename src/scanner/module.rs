//! Loaded-module scanner.

use crate::core::error::Error;
use crate::core::types::{DetectionKind, DiscoveryStats, ProcessRecord};
use crate::scanner::process::ProcessSource;
use crate::utils::path::{display_path, paths_equal, FolderPrefix};
use std::path::Path;

/// Finds processes that have loaded a library from under a folder.
///
/// A process's own main executable shows up in its module list too; that
/// relationship belongs to the executable scanner and is not repeated here.
/// Processes whose modules cannot be read count as skipped.
pub struct ModuleScanner<'a, P: ?Sized> {
    processes: &'a P,
}

impl<'a, P: ProcessSource + ?Sized> ModuleScanner<'a, P> {
    pub fn new(processes: &'a P) -> Self {
        Self { processes }
    }

    pub fn scan_folder(&self, folder: &Path, stats: &mut DiscoveryStats) -> Vec<ProcessRecord> {
        let processes = match self.processes.processes() {
            Ok(processes) => processes,
            Err(e) => {
                log::warn!("Process enumeration failed, skipping module scan: {}", e);
                return Vec::new();
            }
        };

        let prefix = FolderPrefix::new(folder);
        let mut records = Vec::new();

        for info in &processes {
            let modules = match self.processes.modules(info.pid) {
                Ok(modules) => modules,
                Err(e) => {
                    let level = if e.is_recoverable() {
                        log::Level::Trace
                    } else {
                        log::Level::Debug
                    };
                    log::log!(level, "Skipping modules of PID {}: {}", info.pid, e);
                    if matches!(e, Error::ProcessAccess { .. }) {
                        stats.processes_skipped += 1;
                    }
                    continue;
                }
            };

            for module in modules.iter().filter(|m| prefix.contains(m)) {
                let is_main = info
                    .path
                    .as_deref()
                    .is_some_and(|exe| paths_equal(exe, module));
                if is_main {
                    continue;
                }

                log::debug!("PID {} has loaded {}", info.pid, module.display());
                records.push(
                    ProcessRecord::new(info.pid, DetectionKind::LoadedModule)
                        .with_name(info.name.clone())
                        .with_executable(info.path_string())
                        .with_resource(display_path(module)),
                );
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::process::ProcessInfo;
    use crate::scanner::testing::FakeProcessSource;

    #[test]
    fn test_modules_under_folder() {
        let source = FakeProcessSource::new()
            .with_process(ProcessInfo::new(1, "host").with_path("/usr/bin/host"))
            .with_modules(1, &["/usr/bin/host", "/opt/plug/a.so", "/opt/plug/b.so", "/lib/libc.so"]);

        let mut stats = DiscoveryStats::default();
        let records = ModuleScanner::new(&source).scan_folder(Path::new("/opt/plug"), &mut stats);

        let resources: Vec<&str> = records.iter().map(|r| r.related_resource.as_str()).collect();
        assert_eq!(resources, vec!["/opt/plug/a.so", "/opt/plug/b.so"]);
        assert!(records.iter().all(|r| r.executable_path == "/usr/bin/host"));
    }

    #[test]
    fn test_main_executable_excluded() {
        let source = FakeProcessSource::new()
            .with_process(ProcessInfo::new(2, "tool").with_path("/opt/plug/tool"))
            .with_modules(2, &["/OPT/plug/tool", "/opt/plug/lib.so"]);

        let mut stats = DiscoveryStats::default();
        let records = ModuleScanner::new(&source).scan_folder(Path::new("/opt/plug"), &mut stats);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].related_resource, "/opt/plug/lib.so");
        assert_ne!(
            records[0].related_resource.to_lowercase(),
            records[0].executable_path.to_lowercase()
        );
    }

    #[test]
    fn test_denied_process_skipped() {
        let source = FakeProcessSource::new()
            .with_process(ProcessInfo::new(3, "secure").with_path("/sbin/secure"))
            .deny_modules(3)
            .with_process(ProcessInfo::new(4, "open").with_path("/usr/bin/open"))
            .with_modules(4, &["/opt/plug/x.so"]);

        let mut stats = DiscoveryStats::default();
        let records = ModuleScanner::new(&source).scan_folder(Path::new("/opt/plug"), &mut stats);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].process_id, 4);
        assert_eq!(stats.processes_skipped, 1);
    }

    #[test]
    fn test_unsupported_listing_not_counted_as_denied() {
        struct NoModules;
        impl ProcessSource for NoModules {
            fn processes(&self) -> crate::core::error::Result<Vec<ProcessInfo>> {
                Ok(vec![ProcessInfo::new(5, "p").with_path("/usr/bin/p")])
            }
            fn process(&self, _pid: u32) -> Option<ProcessInfo> {
                None
            }
            fn modules(&self, _pid: u32) -> crate::core::error::Result<Vec<std::path::PathBuf>> {
                Err(Error::NotSupported("module listing".to_string()))
            }
        }

        let mut stats = DiscoveryStats::default();
        let records = ModuleScanner::new(&NoModules).scan_folder(Path::new("/usr"), &mut stats);
        assert!(records.is_empty());
        assert_eq!(stats.processes_skipped, 0);
        assert_eq!(stats.processes_examined, 0);
    }

    #[test]
    fn test_enumeration_failure_is_empty() {
        let source = FakeProcessSource::new()
            .with_process(ProcessInfo::new(4, "open"))
            .with_modules(4, &["/opt/plug/x.so"])
            .failing();
        let mut stats = DiscoveryStats::default();
        assert!(ModuleScanner::new(&source)
            .scan_folder(Path::new("/opt/plug"), &mut stats)
            .is_empty());
    }
}
