//! Single-file blob stores.
//!
//! ## File Format
//!
//! ```text
//! [Header: 32B]      // "indexOffset=" + 19 digits + "\n"
//! [Entry 1 contents]
//! [Entry 2 contents]
//! ...
//! [Entry N contents]
//! [Index section]    // one line per entry, sorted by name
//! ```
//!
//! Entry contents are stored back to back without padding. The index section
//! may instead live in a separate file, in which case the header records the
//! end of the data section.

pub mod header;
pub mod lazy;
pub mod reader;
pub mod search;
pub mod writer;

pub use lazy::LazyReader;
pub use reader::FileBlobStoreReader;
pub use search::{IndexSearch, PositionCache};
pub use writer::{BlobEntryWriter, FileBlobStoreWriter, WriterBuilder};

use crate::config::Encoding;
use crate::error::Result;
use crate::index::BlobEntry;
use std::io::Read;

/// Header size in bytes (fixed)
pub const HEADER_SIZE: usize = 32;

/// Boxed reader over entry contents.
pub type ContentReader = Box<dyn Read + Send>;

/// Read access to a blob store.
pub trait BlobStoreReader {
    /// Look up an entry by exact name.
    fn get_entry(&self, name: &str) -> Result<Option<BlobEntry>>;

    /// Stored bytes of an entry, exactly `[offset, offset + length)`.
    fn get_contents(&self, entry: &BlobEntry) -> Result<ContentReader>;

    /// Visit every entry in index order.
    ///
    /// The contents reader handed to the visitor is opened only if the
    /// visitor reads from it and is closed after each visit.
    fn visit_entries(
        &self,
        visitor: &mut dyn FnMut(&BlobEntry, &mut dyn Read) -> Result<()>,
    ) -> Result<()>;

    /// Entry contents with the entry's encoding removed.
    fn get_contents_decoded(&self, entry: &BlobEntry) -> Result<ContentReader> {
        let stored = self.get_contents(entry)?;
        Ok(crate::encoding::decode(entry.encoding(), stored))
    }

    /// Stored bytes of the named entry, if present.
    fn contents_by_name(&self, name: &str) -> Result<Option<ContentReader>> {
        match self.get_entry(name)? {
            Some(entry) => Ok(Some(self.get_contents(&entry)?)),
            None => Ok(None),
        }
    }

    /// Decoded contents of the named entry, if present.
    fn decoded_contents_by_name(&self, name: &str) -> Result<Option<ContentReader>> {
        match self.get_entry(name)? {
            Some(entry) => Ok(Some(self.get_contents_decoded(&entry)?)),
            None => Ok(None),
        }
    }
}

/// Write access to a blob store.
pub trait BlobStoreWriter {
    /// Append the bytes of `contents` as a new entry.
    ///
    /// The bytes are stored as given; `encoding` only describes them. A name
    /// written twice resolves to the last write once the store is closed.
    fn add_entry<R: Read>(
        &self,
        name: &str,
        contents: R,
        media_type: Option<&str>,
        encoding: Option<Encoding>,
    ) -> Result<()>;

    /// Gzip compress `plain` while appending it.
    fn add_entry_gzip_encoded<R: Read>(
        &self,
        name: &str,
        plain: R,
        media_type: Option<&str>,
    ) -> Result<()> {
        let mut compressed = crate::encoding::GzipCompressingReader::new(plain);
        let added = self.add_entry(name, &mut compressed, media_type, Some(Encoding::Gzip));
        let closed = compressed.close();
        added?;
        closed?;
        Ok(())
    }

    /// Append `contents` unencoded.
    fn add_entry_unencoded<R: Read>(
        &self,
        name: &str,
        contents: R,
        media_type: Option<&str>,
    ) -> Result<()> {
        self.add_entry(name, contents, media_type, Some(Encoding::Identity))
    }

    /// Copy every entry of `reader` into this store, keeping names, media
    /// types and encodings. Stored bytes are copied without re-encoding.
    fn merge_from<S: BlobStoreReader + ?Sized>(&self, reader: &S) -> Result<()> {
        reader.visit_entries(&mut |entry, contents| {
            self.add_entry(entry.name(), contents, Some(entry.media_type()), Some(entry.encoding()))
        })
    }

    /// Finish the store.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
