//! The size-bounded compression loop.
//!
//! Given an oversized JPEG/PNG file and a kilobyte budget, re-encode it as
//! JPEG at decreasing quality until the output fits or the quality ladder is
//! exhausted. The pixel buffer is decoded once and reused across passes; only
//! the encoded bytes change. The EXIF orientation tag is re-read before every
//! overwrite and restored after it, because re-encoding discards metadata.
//!
//! ## Quality ladder
//!
//! Passes run at 100, 80, 60, 40. After a failed pass the quality steps down
//! by [`QUALITY_STEP`]; the search gives up once the next candidate would be
//! at or below the step value, so 40 is the last quality ever attempted and
//! at most four encodes happen per call.
//!
//! ## Side effects
//!
//! In the default mode the file is overwritten on every pass, so a search
//! that fails leaves the last (lowest-quality, still oversized) encoding on
//! disk. [`CompressOptions::atomic_replace`] stages passes in a scratch
//! sibling instead and only renames over the original on success.
//!
//! ## Blocking
//!
//! Every call performs blocking file I/O and CPU-bound encoding. Run it off
//! any latency-sensitive thread; [`CompressOptions::cancel`] is checked once
//! per pass for cooperative shutdown. Two concurrent calls on the same path
//! race on the file and are undefined — callers must serialize per path.
//! Calls on distinct paths share nothing.

use crate::imaging::{BackendError, ImageBackend, Quality};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Quality of the first pass; every search starts here.
pub const MAX_QUALITY: u32 = 100;

/// Decrement between passes, and the floor: the search stops once the next
/// candidate quality would be at or below this value.
pub const QUALITY_STEP: u32 = 20;

/// Size ceiling used when the caller does not supply one, in kilobytes.
pub const DEFAULT_TARGET_KB: u64 = 999;

const BYTES_PER_KB: u64 = 1024;

/// Path fragments that mark a file as compressible.
///
/// Matched as case-sensitive substrings of the whole path, not as suffixes:
/// `archive.jpg.bak` is accepted, `PHOTO.JPG` is not. Tightening this to a
/// real extension check changes which files get overwritten, so the loose
/// test is kept deliberately.
const SUPPORTED_MARKERS: &[&str] = &[".jpeg", ".jpg", ".png"];

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("cannot decode {path}: {source}")]
    Decode { path: PathBuf, source: BackendError },
    #[error("cannot write compressed output for {path}: {source}")]
    EncodeOrWrite { path: PathBuf, source: BackendError },
    #[error("orientation tag could not be restored on {path}: {source}")]
    MetadataLoss { path: PathBuf, source: BackendError },
}

/// Terminal result of a compression attempt.
///
/// The reasons a file is *not* shrunk — unsupported path, already within
/// budget, quality exhausted, cancelled — are deliberately collapsed into one
/// variant. The event trace carries the detail for callers that want it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// The file fits the budget and holds the JPEG encoding at `quality`.
    Shrunk { quality: u32, size_kb: u64 },
    /// The file was not shrunk below the budget.
    NotShrunk,
}

impl CompressionOutcome {
    pub fn is_shrunk(&self) -> bool {
        matches!(self, Self::Shrunk { .. })
    }
}

/// Knobs for a single compression call.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Size ceiling in kilobytes.
    pub target_kb: u64,
    /// Stage every pass in a scratch sibling and rename over the original
    /// only on success. The original is untouched on failure or
    /// cancellation; the default in-place mode instead leaves the last
    /// attempted pass on disk.
    pub atomic_replace: bool,
    /// Checked once per pass; once set, the search stops before the next
    /// encode and reports `NotShrunk`.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            target_kb: DEFAULT_TARGET_KB,
            atomic_replace: false,
            cancel: None,
        }
    }
}

/// Per-pass trace of a compression call, for callers that display progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressEvent {
    /// Emitted once, after the early checks pass and before the first encode.
    Started { source_kb: u64, target_kb: u64 },
    /// Emitted after a pass has been written and measured.
    PassEncoded { quality: u32, size_kb: u64 },
}

/// Compress `path` in place until it fits `target_kb`, with default options.
pub fn compress(
    backend: &impl ImageBackend,
    path: &Path,
    target_kb: u64,
) -> Result<CompressionOutcome, CompressError> {
    let options = CompressOptions {
        target_kb,
        ..CompressOptions::default()
    };
    compress_with_options(backend, path, &options, None)
}

/// Compress `path` until it fits `options.target_kb`.
///
/// Exits `NotShrunk` without touching the file when the path carries no
/// supported marker or the file already fits. Otherwise decodes once and
/// walks the quality ladder; see the [module docs](self) for the side-effect
/// contract of the two replace modes.
///
/// Decode, encode, and write failures are fatal. Losing an orientation tag
/// that was present is fatal; a tag that cannot be *read* is treated as
/// absent.
pub fn compress_with_options(
    backend: &impl ImageBackend,
    path: &Path,
    options: &CompressOptions,
    events: Option<Sender<CompressEvent>>,
) -> Result<CompressionOutcome, CompressError> {
    if !path_has_supported_marker(path) {
        return Ok(CompressionOutcome::NotShrunk);
    }

    let source_kb = probe_kb(backend, path)?;
    if source_kb <= options.target_kb {
        return Ok(CompressionOutcome::NotShrunk);
    }

    // Decoded once; every pass re-encodes this same buffer.
    let image = backend.decode(path).map_err(|source| CompressError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    emit(
        &events,
        CompressEvent::Started {
            source_kb,
            target_kb: options.target_kb,
        },
    );

    if !options.atomic_replace {
        return search(backend, path, path, &image, options, &events);
    }

    let scratch = scratch_path(path);
    let outcome = search(backend, path, &scratch, &image, options, &events);
    match &outcome {
        Ok(CompressionOutcome::Shrunk { .. }) => {
            backend
                .rename(&scratch, path)
                .map_err(|source| encode_or_write(path, source))?;
        }
        // The scratch file must not survive a failed search. Nothing was
        // ever written there if the first encode failed, so a remove error
        // is ignored.
        _ => {
            let _ = backend.remove_file(&scratch);
        }
    }
    outcome
}

/// The quality ladder itself. Reads the orientation tag from `tag_source`
/// and writes every pass to `output`; in-place callers pass the same path
/// for both.
fn search(
    backend: &impl ImageBackend,
    tag_source: &Path,
    output: &Path,
    image: &DynamicImage,
    options: &CompressOptions,
    events: &Option<Sender<CompressEvent>>,
) -> Result<CompressionOutcome, CompressError> {
    let mut quality = MAX_QUALITY;
    loop {
        if is_cancelled(options) {
            return Ok(CompressionOutcome::NotShrunk);
        }

        // Re-read every pass: the previous encode destroyed whatever tag the
        // previous pass restored.
        let orientation = backend.read_orientation(tag_source).ok().flatten();

        let bytes = backend
            .encode_jpeg(image, Quality::new(quality))
            .map_err(|source| encode_or_write(output, source))?;
        backend
            .write_bytes(output, &bytes)
            .map_err(|source| encode_or_write(output, source))?;

        if let Some(tag) = orientation {
            backend
                .write_orientation(output, tag)
                .map_err(|source| CompressError::MetadataLoss {
                    path: output.to_path_buf(),
                    source,
                })?;
        }

        let size_kb = probe_kb(backend, output)?;
        emit(events, CompressEvent::PassEncoded { quality, size_kb });

        if size_kb <= options.target_kb {
            return Ok(CompressionOutcome::Shrunk { quality, size_kb });
        }

        quality -= QUALITY_STEP;
        if quality <= QUALITY_STEP {
            return Ok(CompressionOutcome::NotShrunk);
        }
    }
}

/// Accept a file by looking for a supported marker anywhere in its path.
pub fn path_has_supported_marker(path: &Path) -> bool {
    let path = path.to_string_lossy();
    SUPPORTED_MARKERS.iter().any(|marker| path.contains(marker))
}

/// File size in whole kilobytes, truncating.
fn probe_kb(backend: &impl ImageBackend, path: &Path) -> Result<u64, CompressError> {
    let bytes = backend
        .file_size(path)
        .map_err(|source| encode_or_write(path, source))?;
    Ok(bytes / BYTES_PER_KB)
}

fn encode_or_write(path: &Path, source: BackendError) -> CompressError {
    CompressError::EncodeOrWrite {
        path: path.to_path_buf(),
        source,
    }
}

fn is_cancelled(options: &CompressOptions) -> bool {
    options
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn emit(events: &Option<Sender<CompressEvent>>, event: CompressEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// Sibling path the atomic mode stages passes in.
fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".imgfit-tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Orientation;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use std::sync::mpsc;

    fn target_999(backend: &MockBackend, path: &str) -> Result<CompressionOutcome, CompressError> {
        compress(backend, Path::new(path), 999)
    }

    // =========================================================================
    // Early exits
    // =========================================================================

    #[test]
    fn unsupported_path_is_skipped_without_any_io() {
        let backend = MockBackend::with_sizes_kb(vec![5000]);
        let outcome = target_999(&backend, "photo.gif").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn uppercase_extension_is_not_matched() {
        let backend = MockBackend::with_sizes_kb(vec![5000]);
        let outcome = target_999(&backend, "PHOTO.JPG").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn marker_anywhere_in_path_is_accepted() {
        // Containment, not a suffix check: a .bak file qualifies because the
        // path contains ".jpg".
        let backend = MockBackend::with_sizes_kb(vec![2000, 500]);
        let outcome = target_999(&backend, "scans/photo.jpg.bak").unwrap();

        assert_eq!(
            outcome,
            CompressionOutcome::Shrunk {
                quality: 100,
                size_kb: 500
            }
        );
    }

    #[test]
    fn already_within_budget_is_a_noop() {
        let backend = MockBackend::with_sizes_kb(vec![500]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        // A single probe, nothing else: no decode, no write
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Probe(_)));
    }

    #[test]
    fn size_equal_to_target_is_within_budget() {
        let backend = MockBackend::with_sizes_kb(vec![999]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert_eq!(backend.encoded_qualities(), Vec::<u32>::new());
    }

    #[test]
    fn kb_conversion_truncates() {
        // 999 KB + 1023 bytes still reads as 999 KB, which fits the budget
        let backend = MockBackend {
            sizes: std::sync::Mutex::new(vec![999 * 1024 + 1023]),
            ..MockBackend::new()
        };
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert_eq!(backend.encoded_qualities(), Vec::<u32>::new());
    }

    // =========================================================================
    // The quality ladder
    // =========================================================================

    #[test]
    fn shrinks_on_first_pass_at_full_quality() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 900]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(
            outcome,
            CompressionOutcome::Shrunk {
                quality: 100,
                size_kb: 900
            }
        );
        assert_eq!(backend.encoded_qualities(), vec![100]);
    }

    #[test]
    fn walks_the_ladder_down_to_sixty() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 1500, 900]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(
            outcome,
            CompressionOutcome::Shrunk {
                quality: 60,
                size_kb: 900
            }
        );
        assert_eq!(backend.encoded_qualities(), vec![100, 80, 60]);
    }

    #[test]
    fn exhausts_after_quality_forty() {
        // Never fits: 40 is the last attempt, the next candidate (20) is the
        // floor, so the search gives up after four encodes.
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 2500, 2000, 1500]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert_eq!(backend.encoded_qualities(), vec![100, 80, 60, 40]);
    }

    #[test]
    fn failed_search_still_wrote_every_pass() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 2500, 2000, 1500]);
        target_999(&backend, "photo.jpg").unwrap();

        let writes: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Write { .. }))
            .collect();
        // The file holds the quality-40 attempt after the loop gives up
        assert_eq!(writes.len(), 4);
        assert!(matches!(&writes[3], RecordedOp::Write { path, .. } if path == "photo.jpg"));
    }

    #[test]
    fn decode_once_reused_across_passes() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 2500, 2000, 1500]);
        target_999(&backend, "photo.jpg").unwrap();

        let decodes = backend
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Decode(_)))
            .count();
        assert_eq!(decodes, 1);
    }

    #[test]
    fn idempotent_after_success() {
        // A file already shrunk below the budget is a no-op on the next call
        let backend = MockBackend::with_sizes_kb(vec![900]);
        let outcome = target_999(&backend, "photo.jpg").unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert_eq!(backend.encoded_qualities(), Vec::<u32>::new());
    }

    // =========================================================================
    // Orientation tag
    // =========================================================================

    #[test]
    fn orientation_restored_after_every_pass() {
        let backend = MockBackend {
            orientation: Orientation::from_exif(6),
            ..MockBackend::with_sizes_kb(vec![5000, 3000, 900])
        };
        target_999(&backend, "photo.jpg").unwrap();

        let ops = backend.get_operations();
        let reads = ops
            .iter()
            .filter(|op| matches!(op, RecordedOp::ReadOrientation(_)))
            .count();
        let writes: Vec<_> = ops
            .iter()
            .filter_map(|op| match op {
                RecordedOp::WriteOrientation { code, .. } => Some(*code),
                _ => None,
            })
            .collect();
        assert_eq!(reads, 2);
        assert_eq!(writes, vec![6, 6]);
    }

    #[test]
    fn tag_write_follows_file_write_within_each_pass() {
        let backend = MockBackend {
            orientation: Orientation::from_exif(3),
            ..MockBackend::with_sizes_kb(vec![5000, 900])
        };
        target_999(&backend, "photo.jpg").unwrap();

        let ops = backend.get_operations();
        let write_idx = ops
            .iter()
            .position(|op| matches!(op, RecordedOp::Write { .. }))
            .unwrap();
        let tag_idx = ops
            .iter()
            .position(|op| matches!(op, RecordedOp::WriteOrientation { .. }))
            .unwrap();
        let probe_after_write = ops
            .iter()
            .skip(write_idx)
            .position(|op| matches!(op, RecordedOp::Probe(_)))
            .unwrap()
            + write_idx;
        assert!(write_idx < tag_idx && tag_idx < probe_after_write);
    }

    #[test]
    fn missing_orientation_is_never_written() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 900]);
        target_999(&backend, "photo.jpg").unwrap();

        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::WriteOrientation { .. }))
        );
    }

    #[test]
    fn failed_orientation_restore_is_fatal() {
        let backend = MockBackend {
            orientation: Orientation::from_exif(8),
            fail_orientation_write: true,
            ..MockBackend::with_sizes_kb(vec![5000, 900])
        };
        let result = target_999(&backend, "photo.jpg");

        assert!(matches!(result, Err(CompressError::MetadataLoss { .. })));
    }

    // =========================================================================
    // Fatal errors
    // =========================================================================

    #[test]
    fn decode_failure_propagates_before_any_write() {
        let backend = MockBackend {
            fail_decode: true,
            ..MockBackend::with_sizes_kb(vec![5000])
        };
        let result = target_999(&backend, "photo.jpg");

        assert!(matches!(result, Err(CompressError::Decode { .. })));
        assert!(
            !backend
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Write { .. }))
        );
    }

    #[test]
    fn probe_failure_propagates() {
        // Empty size script: the very first probe fails
        let backend = MockBackend::new();
        let result = target_999(&backend, "photo.jpg");

        assert!(matches!(result, Err(CompressError::EncodeOrWrite { .. })));
    }

    // =========================================================================
    // Events and cancellation
    // =========================================================================

    #[test]
    fn events_trace_each_pass() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 900]);
        let (tx, rx) = mpsc::channel();
        let options = CompressOptions {
            target_kb: 999,
            ..CompressOptions::default()
        };
        compress_with_options(&backend, Path::new("photo.jpg"), &options, Some(tx)).unwrap();

        let events: Vec<_> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                CompressEvent::Started {
                    source_kb: 5000,
                    target_kb: 999
                },
                CompressEvent::PassEncoded {
                    quality: 100,
                    size_kb: 3000
                },
                CompressEvent::PassEncoded {
                    quality: 80,
                    size_kb: 900
                },
            ]
        );
    }

    #[test]
    fn cancellation_stops_before_the_next_encode() {
        let backend = MockBackend::with_sizes_kb(vec![5000]);
        let cancel = Arc::new(AtomicBool::new(true));
        let options = CompressOptions {
            target_kb: 999,
            cancel: Some(cancel),
            ..CompressOptions::default()
        };
        let outcome =
            compress_with_options(&backend, Path::new("photo.jpg"), &options, None).unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        assert_eq!(backend.encoded_qualities(), Vec::<u32>::new());
    }

    // =========================================================================
    // Atomic replace
    // =========================================================================

    #[test]
    fn atomic_mode_stages_in_scratch_and_renames_on_success() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 900]);
        let options = CompressOptions {
            target_kb: 999,
            atomic_replace: true,
            ..CompressOptions::default()
        };
        let outcome =
            compress_with_options(&backend, Path::new("photo.jpg"), &options, None).unwrap();

        assert!(outcome.is_shrunk());
        let ops = backend.get_operations();
        assert!(ops.iter().any(
            |op| matches!(op, RecordedOp::Write { path, .. } if path == "photo.jpg.imgfit-tmp")
        ));
        assert!(
            !ops.iter()
                .any(|op| matches!(op, RecordedOp::Write { path, .. } if path == "photo.jpg"))
        );
        assert!(ops.iter().any(|op| matches!(
            op,
            RecordedOp::Rename { from, to }
                if from == "photo.jpg.imgfit-tmp" && to == "photo.jpg"
        )));
    }

    #[test]
    fn atomic_mode_discards_scratch_on_exhaustion() {
        let backend = MockBackend::with_sizes_kb(vec![5000, 3000, 2500, 2000, 1500]);
        let options = CompressOptions {
            target_kb: 999,
            atomic_replace: true,
            ..CompressOptions::default()
        };
        let outcome =
            compress_with_options(&backend, Path::new("photo.jpg"), &options, None).unwrap();

        assert_eq!(outcome, CompressionOutcome::NotShrunk);
        let ops = backend.get_operations();
        assert!(
            ops.iter()
                .any(|op| matches!(op, RecordedOp::Remove(p) if p == "photo.jpg.imgfit-tmp"))
        );
        assert!(
            !ops.iter()
                .any(|op| matches!(op, RecordedOp::Rename { .. }))
        );
    }

    #[test]
    fn atomic_mode_reads_tag_from_the_original() {
        let backend = MockBackend {
            orientation: Orientation::from_exif(6),
            ..MockBackend::with_sizes_kb(vec![5000, 3000, 900])
        };
        let options = CompressOptions {
            target_kb: 999,
            atomic_replace: true,
            ..CompressOptions::default()
        };
        compress_with_options(&backend, Path::new("photo.jpg"), &options, None).unwrap();

        let ops = backend.get_operations();
        assert!(
            ops.iter()
                .all(|op| !matches!(op, RecordedOp::ReadOrientation(p) if p != "photo.jpg"))
        );
        assert!(ops.iter().any(|op| matches!(
            op,
            RecordedOp::WriteOrientation { path, code: 6 } if path == "photo.jpg.imgfit-tmp"
        )));
    }
}
