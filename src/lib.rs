//! # blobstore - Append-Only Named Blob Files
//!
//! A blob store is a single file holding many named binary objects followed
//! by a sorted text index, so any entry can be found by name with a binary
//! search over the index section.
//!
//! ## Architecture
//!
//! - **Store**: the single-file format, its writer and its reader
//! - **Index**: index line codec, spilled chunks and the external merge
//! - **Encoding**: streaming gzip compression of entry contents
//! - **Multi**: rotating writer and multi-file reader over several stores
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use blobstore::{BlobStoreReader, BlobStoreWriter, FileBlobStoreReader, FileBlobStoreWriter};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), blobstore::Error> {
//! let writer = FileBlobStoreWriter::builder().blob_file("assets.blob").build()?;
//! writer.add_entry_gzip_encoded("index.html", &b"<html></html>"[..], Some("text/html"))?;
//! writer.add_entry_unencoded("logo.png", &b"\x89PNG"[..], Some("image/png"))?;
//! writer.close()?;
//!
//! let reader = FileBlobStoreReader::open("assets.blob")?;
//! if let Some(mut contents) = reader.decoded_contents_by_name("index.html")? {
//!     let mut html = String::new();
//!     contents.read_to_string(&mut html)?;
//!     println!("{}", html);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod encoding;
pub mod error;
pub mod index;
pub mod multi;
pub mod store;

// Re-exports
pub use config::{Encoding, ReaderOptions, StoreDefaults, WriterOptions};
pub use encoding::GzipCompressingReader;
pub use error::{Error, Result};
pub use index::BlobEntry;
pub use multi::{MultiFileBlobStoreReader, RotatingFileBlobStoreWriter, RotatingWriterBuilder};
pub use store::{
    BlobEntryWriter, BlobStoreReader, BlobStoreWriter, ContentReader, FileBlobStoreReader,
    FileBlobStoreWriter, WriterBuilder,
};
