//! Stores spread over several files.
//!
//! [`MultiFileBlobStoreReader`] presents a list of single-file stores as one
//! read view, and [`RotatingFileBlobStoreWriter`] spreads appends over a
//! sequence of files with a bounded number of entries each.

pub mod reader;
pub mod rotating;

pub use reader::MultiFileBlobStoreReader;
pub use rotating::{RotatingFileBlobStoreWriter, RotatingWriterBuilder};
