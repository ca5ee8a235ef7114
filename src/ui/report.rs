//! Plain-text rendering of discovery and termination results.

use crate::core::types::{DiscoveryReport, ProcessRecord, TerminationOutcome};
use std::fmt::Write;

const NAME_WIDTH: usize = 24;

/// Render a discovery report as a table followed by a summary.
pub fn render_report(report: &DiscoveryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target: {} ({})", report.target.path.display(), report.target.kind);
    let _ = writeln!(out);

    if report.records.is_empty() {
        let _ = writeln!(out, "No processes found.");
    } else {
        out.push_str(&render_records(&report.records));
    }

    let stats = &report.stats;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} record(s), {} process(es), {} ms",
        report.records.len(),
        report.distinct_processes(),
        report.duration_ms
    );
    if stats.files_enumerated > 0 {
        let _ = writeln!(
            out,
            "Files checked: {}{}",
            stats.files_enumerated,
            if stats.files_truncated { " (limit reached)" } else { "" }
        );
    }
    if stats.processes_skipped > 0 {
        let _ = writeln!(
            out,
            "Processes skipped (access denied): {}",
            stats.processes_skipped
        );
    }
    out
}

/// Render records as an aligned table.
pub fn render_records(records: &[ProcessRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>8}  {:<name$}  {:<18}  {}",
        "PID",
        "NAME",
        "KIND",
        "RESOURCE",
        name = NAME_WIDTH
    );
    for record in records {
        let resource = if record.related_resource.is_empty() {
            &record.executable_path
        } else {
            &record.related_resource
        };
        let _ = writeln!(
            out,
            "{:>8}  {:<name$}  {:<18}  {}",
            record.process_id,
            truncate(&record.process_name, NAME_WIDTH),
            record.detection_kind.to_string(),
            resource,
            name = NAME_WIDTH
        );
    }
    out
}

/// Render termination outcomes, one line each.
pub fn render_outcomes(outcomes: &[TerminationOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        let status = if outcome.success { "OK" } else { "FAILED" };
        let _ = writeln!(out, "{:>8}  {:<6}  {}", outcome.process_id, status, outcome.detail);
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
