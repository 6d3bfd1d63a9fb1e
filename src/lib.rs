//! # imgfit
//!
//! Recompress oversized photos in place until they fit a size budget,
//! keeping their EXIF orientation.
//!
//! # How It Works
//!
//! The core is a quality-search loop: decode the image once, then re-encode
//! it as JPEG at 100, 80, 60, 40 quality — overwriting the file and
//! restoring its orientation tag after every pass — until the file fits the
//! budget or the ladder is exhausted. The search never resizes, never
//! converts color spaces, and always lands on JPEG regardless of the input
//! format.
//!
//! ```text
//! photo.jpg (2481 KB, budget 999 KB)
//!     quality 100 → 1920 KB    too big
//!     quality  80 → 1304 KB    too big
//!     quality  60 →  843 KB    done
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`compressor`] | The quality-search loop: options, outcome, per-pass events, error taxonomy |
//! | [`imaging`] | The leaf operations behind a trait: decode, JPEG encode, orientation tag access, file plumbing |
//! | [`batch`] | Directory sweep (parallel) and probe-only dry run, with a JSON-serializable report |
//! | [`output`] | CLI display: pure `format_*` functions + `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## In-Place Mutation Is the Contract
//!
//! The file at the given path is the unit of work: every pass overwrites it,
//! and a failed search leaves the last (lowest-quality, still oversized)
//! attempt on disk. Callers that cannot accept that use
//! [`compressor::CompressOptions::atomic_replace`], which stages passes in a
//! scratch sibling and renames over the original only on success.
//!
//! ## Orientation Survives, Other Metadata Does Not
//!
//! JPEG re-encoding discards metadata wholesale. The orientation tag is the
//! one field that changes how a photo *looks*, so it is re-read before every
//! overwrite and re-embedded after. If a tag was present and cannot be
//! restored, the call fails loudly rather than silently flattening a rotated
//! photo.
//!
//! ## Loose Format Check
//!
//! Files are accepted when their path *contains* `.jpeg`, `.jpg`, or `.png`
//! (case-sensitive) — a containment test, not an extension check. Decoding
//! sniffs actual content, so a mislabelled file either decodes fine or fails
//! loudly.
//!
//! ## Events Instead of a Logger
//!
//! The per-pass size trace is an observability concern, not core logic. The
//! loop emits structured events over a channel the caller may pass; the CLI
//! drains them from a printer thread. There is no global logger to
//! configure.

pub mod batch;
pub mod compressor;
pub mod imaging;
pub mod output;
