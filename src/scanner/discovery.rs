//! Discovery aggregator.
//!
//! Runs the scanners that apply to a target, concatenates their output in a
//! fixed order and collapses repeated `(process, detection kind)` findings to
//! the first one seen.

use crate::core::config::DiscoveryConfig;
use crate::core::types::{
    DetectionKind, DiscoveryReport, DiscoveryStats, ProcessRecord, Target, TargetKind,
};
use crate::scanner::executable::ExecutableScanner;
use crate::scanner::file_lock::FileLockScanner;
use crate::scanner::lock::{LockRegistry, SystemLockRegistry};
use crate::scanner::module::ModuleScanner;
use crate::scanner::process::{ProcessEnumerator, ProcessSource};
use crate::utils::path::looks_executable;
use chrono::Local;
use std::collections::HashSet;
use std::time::Instant;

/// Where a discovery pass is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Scanning,
    Merged,
    Done,
}

/// One single-use discovery pass.
#[derive(Debug)]
pub struct DiscoveryPass {
    state: PassState,
    collected: Vec<ProcessRecord>,
    stats: DiscoveryStats,
}

impl Default for DiscoveryPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryPass {
    pub fn new() -> Self {
        Self {
            state: PassState::Idle,
            collected: Vec::new(),
            stats: DiscoveryStats::default(),
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    /// Run one scanner, appending its output to the pass.
    pub fn scan<F>(&mut self, scanner: F)
    where
        F: FnOnce(&mut DiscoveryStats) -> Vec<ProcessRecord>,
    {
        debug_assert!(matches!(self.state, PassState::Idle | PassState::Scanning));
        self.state = PassState::Scanning;
        let records = scanner(&mut self.stats);
        self.collected.extend(records);
    }

    /// Deduplicate everything collected so far.
    pub fn merge(&mut self) {
        debug_assert!(matches!(self.state, PassState::Idle | PassState::Scanning));
        let raw = self.collected.len();
        self.collected = dedup_records(std::mem::take(&mut self.collected));
        log::trace!("Merged {} raw findings into {}", raw, self.collected.len());
        self.state = PassState::Merged;
    }

    /// Hand over the merged records and counters.
    pub fn finish(mut self) -> (Vec<ProcessRecord>, DiscoveryStats) {
        debug_assert_eq!(self.state, PassState::Merged);
        self.state = PassState::Done;
        (self.collected, self.stats)
    }
}

/// Keep the first record for each `(process_id, detection_kind)`, preserving order.
pub fn dedup_records(records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
    let mut seen: HashSet<(u32, DetectionKind)> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|record| seen.insert(record.key()))
        .collect()
}

/// Discovery entry point: which processes use a path, and how.
pub struct Discovery<P = ProcessEnumerator, R = SystemLockRegistry> {
    processes: P,
    registry: R,
    config: DiscoveryConfig,
}

impl Discovery {
    /// Discovery over the live system.
    pub fn system(config: DiscoveryConfig) -> Self {
        Self::new(ProcessEnumerator::new(), SystemLockRegistry::default(), config)
    }
}

impl<P: ProcessSource, R: LockRegistry> Discovery<P, R> {
    pub fn new(processes: P, registry: R, config: DiscoveryConfig) -> Self {
        Self {
            processes,
            registry,
            config,
        }
    }

    /// Ordered, deduplicated records for `target`.
    ///
    /// Per-process and per-file failures are absorbed; the worst case is an
    /// empty result.
    pub fn discover(&self, target: &Target) -> Vec<ProcessRecord> {
        self.discover_report(target).records
    }

    /// Like [`discover`](Self::discover), with counters and timing.
    pub fn discover_report(&self, target: &Target) -> DiscoveryReport {
        let scanned_at = Local::now();
        let started = Instant::now();
        log::info!("Scanning {} {}", target.kind, target.path.display());

        let mut pass = DiscoveryPass::new();
        let executables = ExecutableScanner::new(&self.processes);
        let locks = FileLockScanner::new(&self.registry, &self.processes, &self.config);

        match target.kind {
            TargetKind::File => {
                pass.scan(|stats| locks.scan(target, stats));
                if looks_executable(&target.path, &self.config.executable_extensions) {
                    pass.scan(|stats| executables.scan_exact(&target.path, stats));
                }
            }
            TargetKind::Folder => {
                let modules = ModuleScanner::new(&self.processes);
                pass.scan(|stats| executables.scan_folder(&target.path, stats));
                pass.scan(|stats| modules.scan_folder(&target.path, stats));
                pass.scan(|stats| locks.scan(target, stats));
            }
        }

        pass.merge();
        let (records, stats) = pass.finish();

        let duration_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Found {} record(s) for {} in {} ms",
            records.len(),
            target.path.display(),
            duration_ms
        );
        if stats.protocol_faults > 0 {
            log::warn!(
                "{} lock registry quer{} ended in a protocol fault",
                stats.protocol_faults,
                if stats.protocol_faults == 1 { "y" } else { "ies" }
            );
        }

        DiscoveryReport {
            target: target.clone(),
            records,
            stats,
            scanned_at,
            duration_ms,
        }
    }
}
