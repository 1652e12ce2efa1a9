//! Read and write iTunes-style metadata (`moov/udta/meta/ilst`) in MP4, M4A
//! and M4V files.
//!
//! Writes patch the item list in place when it fits in the space it already
//! occupies and fall back to rebuilding the file into a temporary that is
//! atomically renamed over the original.

pub mod api;
pub mod boxes;
pub mod error;
pub mod ilst;
pub mod io;
pub mod known_boxes;
pub mod parser;
pub mod registry;
pub mod structure;
pub mod tags;
pub mod util;
pub mod writer;

pub use api::Mp4Tag;
pub use boxes::{BoxHeader, FourCC};
pub use error::{Error, Result};
pub use structure::{BoxSpan, FileStructure};
pub use tags::{SimpleTag, Tag, TagCollection, TargetType};
pub use writer::{WriteOptions, WriteStrategy};

/// Library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
