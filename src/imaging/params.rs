//! Parameter types shared between the compressor and the backends.
//!
//! - [`Quality`] — Lossy encoding quality (1–100). Clamped on construction.
//! - [`Orientation`] — EXIF orientation code (1–8). Validated on construction.

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// EXIF orientation code describing the rotation/flip needed to display an
/// image upright.
///
/// Valid codes:
/// 1 = Normal, 2 = Flipped horizontally, 3 = Rotated 180°,
/// 4 = Flipped vertically, 5 = Transposed, 6 = Rotated 90° CW,
/// 7 = Transverse, 8 = Rotated 270° CW
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation(u16);

impl Orientation {
    /// Wrap a raw EXIF code. Returns `None` for anything outside 1-8.
    pub fn from_exif(code: u16) -> Option<Self> {
        (1..=8).contains(&code).then_some(Self(code))
    }

    pub fn exif_code(self) -> u16 {
        self.0
    }
}
