//! Directory sweep: apply the compression loop across a tree.
//!
//! Candidate files are selected with the same loose path test the compressor
//! uses, so a sweep and a direct `compress` call always agree on what gets
//! touched. Files are compressed in parallel with
//! [rayon](https://docs.rs/rayon); each worker owns a distinct path, which
//! satisfies the compressor's serialize-per-path rule.
//!
//! Per-file failures are recorded in the report and do not abort the sweep —
//! one corrupt file should not stop a thousand good ones.

use crate::compressor::{self, CompressOptions, CompressionOutcome};
use crate::imaging::ImageBackend;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// One file's result within a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Shrunk { quality: u32, size_kb: u64 },
    NotShrunk,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Sweep summary, serialized as the `--report` JSON.
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub target_kb: u64,
    pub shrunk: usize,
    pub not_shrunk: usize,
    pub failed: usize,
    pub files: Vec<FileReport>,
}

/// Event stream for a sweep: one message per finished file, in completion
/// order (not path order — workers race).
#[derive(Debug, Clone)]
pub struct SweepEvent {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Compress every candidate file under `root` against `options.target_kb`.
pub fn sweep(
    backend: &impl ImageBackend,
    root: &Path,
    options: &CompressOptions,
    events: Option<Sender<SweepEvent>>,
) -> Result<SweepReport, BatchError> {
    let candidates = collect_candidates(root)?;

    let mut files: Vec<FileReport> = candidates
        .par_iter()
        .map(|path| {
            let status = match compressor::compress_with_options(backend, path, options, None) {
                Ok(CompressionOutcome::Shrunk { quality, size_kb }) => {
                    FileStatus::Shrunk { quality, size_kb }
                }
                Ok(CompressionOutcome::NotShrunk) => FileStatus::NotShrunk,
                Err(error) => FileStatus::Failed {
                    error: error.to_string(),
                },
            };
            if let Some(tx) = &events {
                tx.send(SweepEvent {
                    path: path.clone(),
                    status: status.clone(),
                })
                .ok();
            }
            FileReport {
                path: path.display().to_string(),
                status,
            }
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let shrunk = files
        .iter()
        .filter(|f| matches!(f.status, FileStatus::Shrunk { .. }))
        .count();
    let not_shrunk = files
        .iter()
        .filter(|f| matches!(f.status, FileStatus::NotShrunk))
        .count();
    let failed = files
        .iter()
        .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
        .count();
    Ok(SweepReport {
        target_kb: options.target_kb,
        shrunk,
        not_shrunk,
        failed,
        files,
    })
}

/// A file the dry run found over the budget.
#[derive(Debug, Clone, Serialize)]
pub struct OversizedFile {
    pub path: String,
    pub size_kb: u64,
}

/// Result of a probe-only dry run.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub target_kb: u64,
    pub oversized: Vec<OversizedFile>,
    pub within_budget: usize,
    /// Candidate files whose size could not be probed.
    pub unreadable: Vec<String>,
}

/// Probe every candidate under `root` without modifying anything.
pub fn check(
    backend: &impl ImageBackend,
    root: &Path,
    target_kb: u64,
) -> Result<CheckReport, BatchError> {
    let mut oversized = Vec::new();
    let mut within_budget = 0;
    let mut unreadable = Vec::new();

    for path in collect_candidates(root)? {
        match backend.file_size(&path) {
            Ok(bytes) if bytes / 1024 > target_kb => oversized.push(OversizedFile {
                path: path.display().to_string(),
                size_kb: bytes / 1024,
            }),
            Ok(_) => within_budget += 1,
            Err(_) => unreadable.push(path.display().to_string()),
        }
    }

    Ok(CheckReport {
        target_kb,
        oversized,
        within_budget,
        unreadable,
    })
}

/// Candidate files under `root`, in path order.
fn collect_candidates(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| BatchError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && compressor::path_has_supported_marker(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
