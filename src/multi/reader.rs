//! Read view over several blob store files.

use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::index::BlobEntry;
use crate::store::{BlobStoreReader, ContentReader, FileBlobStoreReader};
use std::io::Read;
use std::path::Path;

/// Read view over an ordered list of blob store files.
///
/// Lookups query the files in order and return the first hit, so the first
/// file wins when a name appears in more than one. Returned entries are
/// tagged with the position of their file, and contents requests are routed
/// back to it.
#[derive(Debug, Default)]
pub struct MultiFileBlobStoreReader {
    readers: Vec<FileBlobStoreReader>,
}

impl MultiFileBlobStoreReader {
    /// Open every path with default options.
    pub fn open<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::open_with_options(paths, ReaderOptions::default())
    }

    /// Open every path, skipping files that are not valid blob stores.
    ///
    /// A file whose header or layout is malformed is logged and left out.
    /// Any other failure, such as a missing file, is returned.
    pub fn open_with_options<I, P>(paths: I, options: ReaderOptions) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut readers = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match FileBlobStoreReader::open_with_options(path, options.clone()) {
                Ok(reader) => readers.push(reader),
                Err(Error::Format(msg)) => {
                    log::warn!("Skipping invalid blob store {:?}: {}", path, msg);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self { readers })
    }

    /// The constituent readers, in lookup order.
    pub fn readers(&self) -> &[FileBlobStoreReader] {
        &self.readers
    }

    /// Number of constituent stores.
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Whether there are no constituent stores.
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    fn reader_for(&self, entry: &BlobEntry) -> Result<&FileBlobStoreReader> {
        let shard = entry.shard().ok_or_else(|| {
            Error::invalid_argument(format!(
                "entry {:?} was not returned by a multi-file reader",
                entry.name()
            ))
        })?;
        self.readers.get(shard).ok_or_else(|| {
            Error::invalid_argument(format!(
                "entry {:?} belongs to unknown store {}",
                entry.name(),
                shard
            ))
        })
    }
}

impl BlobStoreReader for MultiFileBlobStoreReader {
    fn get_entry(&self, name: &str) -> Result<Option<BlobEntry>> {
        for (shard, reader) in self.readers.iter().enumerate() {
            if let Some(entry) = reader.get_entry(name)? {
                return Ok(Some(entry.with_shard(shard)));
            }
        }
        Ok(None)
    }

    fn get_contents(&self, entry: &BlobEntry) -> Result<ContentReader> {
        self.reader_for(entry)?.get_contents(entry)
    }

    /// Visit the entries of each store in turn. Names present in several
    /// stores are visited once per store.
    fn visit_entries(
        &self,
        visitor: &mut dyn FnMut(&BlobEntry, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        for (shard, reader) in self.readers.iter().enumerate() {
            reader.visit_entries(&mut |entry, contents| {
                visitor(&entry.clone().with_shard(shard), contents)
            })?;
        }
        Ok(())
    }
}
