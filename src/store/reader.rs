//! Single-file blob store reader.
//!
//! Every lookup and every contents stream opens its own file handle, so a
//! reader can be shared across threads without one caller's seeks
//! disturbing another. The only shared mutable state is the position cache.

use crate::config::{ReaderOptions, StoreDefaults};
use crate::error::{Error, Result};
use crate::index::BlobEntry;
use crate::store::header;
use crate::store::lazy::LazyReader;
use crate::store::search::{IndexSearch, PositionCache, SeekableIndexLines};
use crate::store::{BlobStoreReader, ContentReader, HEADER_SIZE};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the index section of a store lives.
#[derive(Debug, Clone)]
struct IndexLocation {
    path: PathBuf,
    start: u64,
    end: u64,
}

/// FileBlobStoreReader provides read access to a blob store file.
///
/// Usage:
/// ```no_run
/// use blobstore::{BlobStoreReader, FileBlobStoreReader};
/// use std::io::Read;
///
/// let reader = FileBlobStoreReader::open("store.blob").unwrap();
/// if let Some(entry) = reader.get_entry("hello.txt").unwrap() {
///     let mut contents = Vec::new();
///     reader.get_contents_decoded(&entry).unwrap().read_to_end(&mut contents).unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct FileBlobStoreReader {
    blob_path: PathBuf,
    index_offset: u64,
    index: IndexLocation,
    defaults: Arc<StoreDefaults>,
    position_cache: Option<PositionCache>,
}

impl FileBlobStoreReader {
    /// Open a store with the standard defaults.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a store whose index section is part of the blob file.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let blob_path = path.as_ref().to_path_buf();
        let (index_offset, file_size) = read_header(&blob_path)?;

        let index = IndexLocation { path: blob_path.clone(), start: index_offset, end: file_size };
        log::debug!(
            "Opened blob store {:?}: index section [{}, {})",
            blob_path,
            index.start,
            index.end
        );
        Ok(Self::from_parts(blob_path, index_offset, index, options))
    }

    /// Open a store whose index section was written to a separate file.
    pub fn open_split<P, Q>(blob_path: P, index_path: Q, options: ReaderOptions) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let blob_path = blob_path.as_ref().to_path_buf();
        let (index_offset, _) = read_header(&blob_path)?;

        let index_path = index_path.as_ref().to_path_buf();
        let index_size = std::fs::metadata(&index_path)?.len();
        let index = IndexLocation { path: index_path, start: 0, end: index_size };
        log::debug!("Opened blob store {:?} with index file {:?}", blob_path, index.path);
        Ok(Self::from_parts(blob_path, index_offset, index, options))
    }

    fn from_parts(
        blob_path: PathBuf,
        index_offset: u64,
        index: IndexLocation,
        options: ReaderOptions,
    ) -> Self {
        let position_cache = match options.position_cache_depth {
            0 => None,
            depth => Some(PositionCache::new(depth)),
        };
        Self {
            blob_path,
            index_offset,
            index,
            defaults: Arc::new(options.defaults),
            position_cache,
        }
    }

    /// Path of the blob file.
    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }

    /// Offset recorded in the header: where the data section ends.
    pub fn index_offset(&self) -> u64 {
        self.index_offset
    }

    /// Defaults used to resolve omitted index fields.
    pub fn defaults(&self) -> &StoreDefaults {
        &self.defaults
    }

    /// The position cache, when enabled.
    pub fn position_cache(&self) -> Option<&PositionCache> {
        self.position_cache.as_ref()
    }

    fn open_index(&self) -> Result<BufReader<File>> {
        let mut file = File::open(&self.index.path)?;
        file.seek(SeekFrom::Start(self.index.start))?;
        Ok(BufReader::new(file))
    }

    fn open_contents(
        blob_path: &Path,
        offset: u64,
        length: u64,
    ) -> std::io::Result<std::io::Take<File>> {
        let mut file = File::open(blob_path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.take(length))
    }
}

/// Read the header, returning the index offset and the file size.
fn read_header(path: &Path) -> Result<(u64, u64)> {
    let mut file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if file_size < HEADER_SIZE as u64 {
        return Err(Error::format(format!("File too small to be a blob store: {:?}", path)));
    }

    let index_offset = header::read_from(&mut file)?;
    if index_offset < HEADER_SIZE as u64 || index_offset > file_size {
        return Err(Error::format(format!(
            "Index offset {} out of range in blob file {:?} (size {})",
            index_offset, path, file_size
        )));
    }
    Ok((index_offset, file_size))
}

impl BlobStoreReader for FileBlobStoreReader {
    fn get_entry(&self, name: &str) -> Result<Option<BlobEntry>> {
        let IndexLocation { start, end, .. } = self.index;
        let lines = SeekableIndexLines::new(self.open_index()?, start, end);
        let mut search = IndexSearch::new(lines, start, end, self.position_cache.as_ref());
        match search.find(name)? {
            Some(line) => Ok(Some(BlobEntry::parse(&line, &self.defaults)?)),
            None => Ok(None),
        }
    }

    fn get_contents(&self, entry: &BlobEntry) -> Result<ContentReader> {
        let contents = Self::open_contents(&self.blob_path, entry.offset(), entry.length())?;
        Ok(Box::new(contents))
    }

    fn visit_entries(
        &self,
        visitor: &mut dyn FnMut(&BlobEntry, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let mut index = self.open_index()?.take(self.index.end - self.index.start);
        let mut line = String::new();
        loop {
            line.clear();
            if index.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let entry = BlobEntry::parse(&line, &self.defaults)?;
            let (offset, length) = (entry.offset(), entry.length());
            let blob_path = &self.blob_path;
            let mut contents = LazyReader::new(|| Self::open_contents(blob_path, offset, length));
            visitor(&entry, &mut contents)?;
        }
    }
}
