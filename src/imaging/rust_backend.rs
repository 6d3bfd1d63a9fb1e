//! Pure Rust image processing backend — zero external dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image` crate, content-sniffed via `with_guessed_format` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at a caller-chosen quality |
//! | Orientation read | `kamadak-exif` (see [`exif`](super::exif)) |
//! | Orientation write | `img-parts` (see [`exif`](super::exif)) |
//! | Write / probe / rename / remove | `std::fs` |
//!
//! Decoding sniffs the actual container rather than trusting the extension:
//! the files this tool accepts are selected by a loose path test, so the
//! extension and the bytes regularly disagree.

use super::backend::{BackendError, ImageBackend};
use super::params::{Orientation, Quality};
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// Stateless, so a single instance can be shared across a rayon pool.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        ImageReader::open(path)
            .map_err(BackendError::Io)?
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    fn encode_jpeg(
        &self,
        image: &DynamicImage,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        // JPEG has no alpha channel; flatten whatever the decoder produced.
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.value() as u8);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;
        Ok(bytes)
    }

    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
        std::fs::write(path, bytes).map_err(BackendError::Io)
    }

    fn file_size(&self, path: &Path) -> Result<u64, BackendError> {
        Ok(std::fs::metadata(path).map_err(BackendError::Io)?.len())
    }

    fn read_orientation(&self, path: &Path) -> Result<Option<Orientation>, BackendError> {
        Ok(super::exif::read_orientation(path))
    }

    fn write_orientation(
        &self,
        path: &Path,
        orientation: Orientation,
    ) -> Result<(), BackendError> {
        super::exif::write_orientation(path, orientation)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), BackendError> {
        std::fs::rename(from, to).map_err(BackendError::Io)
    }

    fn remove_file(&self, path: &Path) -> Result<(), BackendError> {
        std::fs::remove_file(path).map_err(BackendError::Io)
    }
}
