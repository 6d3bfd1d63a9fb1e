//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the leaf operations the compression
//! loop is built from: decode a pixel buffer, encode it as JPEG at a given
//! quality, overwrite a file, probe its size, and read/restore the EXIF
//! orientation tag. Rename/remove exist for the atomic-replace mode, which
//! stages every pass in a scratch file.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend) — pure Rust, everything
//! statically linked into the binary.

use super::params::{Orientation, Quality};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for the leaf operations of the compression loop.
///
/// The loop itself is backend-agnostic: it decides *when* to decode, encode,
/// overwrite, and re-tag, and a backend decides *how*. `Sync` so a single
/// backend can be shared across rayon workers in a directory sweep.
pub trait ImageBackend: Sync {
    /// Decode the full pixel buffer from a file.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Encode a pixel buffer as baseline JPEG at the given quality.
    fn encode_jpeg(
        &self,
        image: &DynamicImage,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;

    /// Overwrite a file with the given bytes (truncate-and-replace).
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), BackendError>;

    /// Current size of the file, in bytes.
    fn file_size(&self, path: &Path) -> Result<u64, BackendError>;

    /// Read the EXIF orientation tag. `Ok(None)` when the file has no
    /// readable tag.
    fn read_orientation(&self, path: &Path) -> Result<Option<Orientation>, BackendError>;

    /// Re-embed an orientation tag into the file's metadata and persist it.
    fn write_orientation(
        &self,
        path: &Path,
        orientation: Orientation,
    ) -> Result<(), BackendError>;

    /// Rename a file over another (used to promote a scratch file).
    fn rename(&self, from: &Path, to: &Path) -> Result<(), BackendError>;

    /// Delete a file (used to discard a scratch file).
    fn remove_file(&self, path: &Path) -> Result<(), BackendError>;
}
