//! EXIF orientation tag access.
//!
//! Reading goes through `kamadak-exif`, which parses the TIFF structure out
//! of JPEG APP1 segments and PNG eXIf chunks. Writing rebuilds a minimal
//! little-endian TIFF body holding only the orientation entry and splices it
//! into the encoded file with `img-parts`; re-encoding has already discarded
//! whatever other metadata the file carried, so there is nothing to merge.

use super::backend::BackendError;
use super::params::Orientation;
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};
use std::path::Path;

const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];
const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

/// Read the EXIF orientation tag from a file.
///
/// Returns `None` when the file is unreadable, carries no EXIF data, or the
/// tag value is outside the valid 1-8 set. An unreadable tag and an absent
/// tag are indistinguishable to callers.
pub fn read_orientation(path: &Path) -> Option<Orientation> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let code = field.value.get_uint(0)?;
    Orientation::from_exif(u16::try_from(code).ok()?)
}

/// Embed an orientation tag into a JPEG or PNG file and persist it.
///
/// The tagged bytes are assembled in memory first; the file is only rewritten
/// once splicing has succeeded.
pub fn write_orientation(path: &Path, orientation: Orientation) -> Result<(), BackendError> {
    let data = std::fs::read(path).map_err(BackendError::Io)?;
    let blob: Bytes = orientation_tiff_blob(orientation).into();

    let mut tagged = Vec::with_capacity(data.len() + 64);
    if data.starts_with(&JPEG_MAGIC) {
        let mut jpeg = Jpeg::from_bytes(data.into()).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to parse JPEG {} for tagging: {}",
                path.display(),
                e
            ))
        })?;
        jpeg.set_exif(Some(blob));
        jpeg.encoder()
            .write_to(&mut tagged)
            .map_err(BackendError::Io)?;
    } else if data.starts_with(&PNG_MAGIC) {
        let mut png = Png::from_bytes(data.into()).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to parse PNG {} for tagging: {}",
                path.display(),
                e
            ))
        })?;
        png.set_exif(Some(blob));
        png.encoder()
            .write_to(&mut tagged)
            .map_err(BackendError::Io)?;
    } else {
        return Err(BackendError::ProcessingFailed(format!(
            "{} is neither JPEG nor PNG, cannot embed orientation",
            path.display()
        )));
    }

    std::fs::write(path, tagged).map_err(BackendError::Io)
}

/// Minimal little-endian TIFF body: one IFD0 with a single SHORT
/// Orientation (0x0112) entry. `img-parts` adds the container framing
/// (APP1 marker + `Exif\0\0` for JPEG, eXIf chunk for PNG).
fn orientation_tiff_blob(orientation: Orientation) -> Vec<u8> {
    let mut buf = Vec::with_capacity(26);

    // TIFF header
    buf.extend_from_slice(b"II");
    buf.extend_from_slice(&42u16.to_le_bytes());
    buf.extend_from_slice(&8u32.to_le_bytes()); // offset to IFD0

    // IFD0: 1 entry
    buf.extend_from_slice(&1u16.to_le_bytes());

    // Orientation tag, type SHORT (3), count 1, value inline padded to 4 bytes
    buf.extend_from_slice(&0x0112u16.to_le_bytes());
    buf.extend_from_slice(&3u16.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&orientation.exif_code().to_le_bytes());
    buf.extend_from_slice(&[0, 0]);

    // Next IFD offset = none
    buf.extend_from_slice(&0u32.to_le_bytes());

    buf
}
