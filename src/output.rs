//! CLI output formatting.
//!
//! Each surface has a `format_*` function (pure, returns strings) and a
//! `print_*` wrapper that writes to stdout. The display contract follows a
//! two-level pattern: a header line per file, indented context lines under
//! it (pass trace, outcome).
//!
//! ```text
//! vacation/beach.jpg
//!     2481 KB over 999 KB budget, searching
//!     quality 100: 1920 KB
//!     quality 80: 1304 KB
//!     quality 60: 843 KB
//!     fits at quality 60 (843 KB)
//! ```

use crate::batch::{CheckReport, FileStatus, SweepEvent, SweepReport};
use crate::compressor::{CompressEvent, CompressionOutcome};

/// Indentation for context lines under a file header: 4 spaces.
const INDENT: &str = "    ";

pub fn format_compress_event(event: &CompressEvent) -> String {
    match event {
        CompressEvent::Started {
            source_kb,
            target_kb,
        } => format!("{INDENT}{source_kb} KB over {target_kb} KB budget, searching"),
        CompressEvent::PassEncoded { quality, size_kb } => {
            format!("{INDENT}quality {quality}: {size_kb} KB")
        }
    }
}

pub fn format_outcome(outcome: &CompressionOutcome) -> String {
    match outcome {
        CompressionOutcome::Shrunk { quality, size_kb } => {
            format!("{INDENT}fits at quality {quality} ({size_kb} KB)")
        }
        CompressionOutcome::NotShrunk => format!("{INDENT}not shrunk"),
    }
}

pub fn format_sweep_event(event: &SweepEvent) -> String {
    let path = event.path.display();
    match &event.status {
        FileStatus::Shrunk { quality, size_kb } => {
            format!("{path}: shrunk to {size_kb} KB (quality {quality})")
        }
        FileStatus::NotShrunk => format!("{path}: unchanged"),
        FileStatus::Failed { error } => format!("{path}: failed: {error}"),
    }
}

pub fn format_sweep_summary(report: &SweepReport) -> String {
    format!(
        "Swept {} files: {} shrunk, {} unchanged, {} failed",
        report.files.len(),
        report.shrunk,
        report.not_shrunk,
        report.failed
    )
}

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} files over the {} KB budget",
        report.oversized.len(),
        report.target_kb
    )];
    for file in &report.oversized {
        lines.push(format!("{INDENT}{} ({} KB)", file.path, file.size_kb));
    }
    for path in &report.unreadable {
        lines.push(format!("{INDENT}{} (unreadable)", path));
    }
    lines.push(format!("{} files within budget", report.within_budget));
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}
