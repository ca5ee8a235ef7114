//! Core type definitions used throughout whouses.

use crate::core::error::{Error, Result};
use crate::utils::path::strip_verbatim_prefix;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a target names a single file or a folder tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    File,
    Folder,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::File => write!(f, "File"),
            TargetKind::Folder => write!(f, "Folder"),
        }
    }
}

/// The path being investigated, resolved once at the start of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Absolute path
    pub path: PathBuf,
    /// File or folder
    pub kind: TargetKind,
}

impl Target {
    /// Build a target without touching the file system.
    pub fn new(path: impl Into<PathBuf>, kind: TargetKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Resolve a user-supplied path into an absolute target.
    ///
    /// Fails with [`Error::PathNotFound`] when nothing exists at `path`.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }

        let absolute = path.canonicalize().map_err(|e| Error::PathResolve {
            path: path.to_path_buf(),
            source: e,
        })?;
        let absolute = strip_verbatim_prefix(absolute);

        let kind = if absolute.is_dir() {
            TargetKind::Folder
        } else {
            TargetKind::File
        };

        Ok(Self {
            path: absolute,
            kind,
        })
    }

    /// Whether this target is a folder.
    pub fn is_folder(&self) -> bool {
        self.kind == TargetKind::Folder
    }
}

/// How a process's relationship to the target was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// The process's main executable lives at or under the target
    RunningExecutable,
    /// The process has loaded a library from under the target
    LoadedModule,
    /// The lock registry reports the process holding a file open
    FileLock,
}

impl DetectionKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::RunningExecutable => "running_executable",
            DetectionKind::LoadedModule => "loaded_module",
            DetectionKind::FileLock => "file_lock",
        }
    }
}

impl std::fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionKind::RunningExecutable => write!(f, "Running Executable"),
            DetectionKind::LoadedModule => write!(f, "Loaded Module"),
            DetectionKind::FileLock => write!(f, "File Lock"),
        }
    }
}

/// One observation of a process's relationship to the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Platform process identifier
    pub process_id: u32,
    /// Display name, empty if unresolvable
    pub process_name: String,
    /// Main executable path, empty if inaccessible
    pub executable_path: String,
    /// How the relationship was found
    pub detection_kind: DetectionKind,
    /// Module or file implicated; empty for running executables
    pub related_resource: String,
}

impl ProcessRecord {
    /// Create a new record with empty name, path and resource.
    pub fn new(process_id: u32, detection_kind: DetectionKind) -> Self {
        Self {
            process_id,
            process_name: String::new(),
            executable_path: String::new(),
            detection_kind,
            related_resource: String::new(),
        }
    }

    /// Set the process name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    /// Set the executable path.
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable_path = path.into();
        self
    }

    /// Set the implicated module or file.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.related_resource = resource.into();
        self
    }

    /// Deduplication key.
    pub fn key(&self) -> (u32, DetectionKind) {
        (self.process_id, self.detection_kind)
    }
}

/// Result of one termination request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationOutcome {
    /// Process the request targeted
    pub process_id: u32,
    /// Whether the process is confirmed gone
    pub success: bool,
    /// Human-readable explanation
    pub detail: String,
}

impl TerminationOutcome {
    /// A confirmed termination.
    pub fn succeeded(process_id: u32) -> Self {
        Self {
            process_id,
            success: true,
            detail: "terminated".to_string(),
        }
    }

    /// A failed termination with an explanation.
    pub fn failed(process_id: u32, detail: impl Into<String>) -> Self {
        Self {
            process_id,
            success: false,
            detail: detail.into(),
        }
    }
}

/// Counters gathered during one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStats {
    /// Live processes examined, each counted once per pass
    pub processes_examined: u64,
    /// Processes whose modules could not be read (access denied)
    pub processes_skipped: u64,
    /// Files handed to the lock registry
    pub files_enumerated: u64,
    /// Whether folder enumeration stopped at the file cap
    pub files_truncated: bool,
    /// Lock registry queries issued (one per file or per batch)
    pub lock_queries: u64,
    /// Queries that could not open a session
    pub sessions_unavailable: u64,
    /// Queries whose resource registration failed
    pub registrations_failed: u64,
    /// Queries that hit an unexpected protocol fault
    pub protocol_faults: u64,
}

/// Outcome of a discovery pass with its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// What was scanned
    pub target: Target,
    /// Deduplicated records in detection order
    pub records: Vec<ProcessRecord>,
    /// Pass counters
    pub stats: DiscoveryStats,
    /// When the pass started
    pub scanned_at: DateTime<Local>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl DiscoveryReport {
    /// Number of distinct processes across all records.
    pub fn distinct_processes(&self) -> usize {
        let mut pids: Vec<u32> = self.records.iter().map(|r| r.process_id).collect();
        pids.sort_unstable();
        pids.dedup();
        pids.len()
    }
}
