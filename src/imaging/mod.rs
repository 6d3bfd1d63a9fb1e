//! Image processing — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` crate (content-sniffed JPEG/PNG) |
//! | **Encode → JPEG** | `image::codecs::jpeg::JpegEncoder` |
//! | **Orientation tag** | `kamadak-exif` (read) + `img-parts` (write) |
//! | **File plumbing** | `std::fs` write / probe / rename / remove |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and [`Orientation`] value types
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Exif**: orientation tag read/write helpers used by the backend

pub mod backend;
pub(crate) mod exif;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use params::{Orientation, Quality};
pub use rust_backend::RustBackend;
