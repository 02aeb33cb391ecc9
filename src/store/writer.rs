//! Single-file blob store writer.
//!
//! Entry contents are appended to the data section as they arrive. Index
//! entries are buffered in memory and, past a configurable threshold, spilled
//! to sorted chunk files. Closing the writer builds the index section, either
//! by sorting the resident entries or by merging all chunks, and then patches
//! the header with the index offset.

use crate::config::{validate_media_type, Encoding, StoreDefaults, WriterOptions};
use crate::error::{Error, Result};
use crate::index::{merge_sorted_runs, sort_entries, validate_name, BlobEntry, IndexChunk};
use crate::store::{header, BlobStoreWriter};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-memory size of a `BlobEntryWriter` before it spills to a temp file.
pub const ENTRY_WRITER_MEMORY_LIMIT: usize = 1024 * 1024;

const HEADER_LEN: u64 = crate::store::HEADER_SIZE as u64;

/// The data section and its write cursor.
struct DataSection {
    out: BufWriter<File>,
    cursor: u64,
}

impl Write for DataSection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.out.write(buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Index entries not yet spilled, in append order.
struct IndexBuffer {
    entries: Vec<BlobEntry>,
    next_seq: u64,
    /// Set once a spilled batch could not be written; its entries are gone.
    failed: Option<String>,
}

/// Where spilled chunk files go.
#[derive(Debug, Clone)]
struct ChunkLocation {
    dir: PathBuf,
    prefix: String,
}

/// FileBlobStoreWriter appends entries to a new blob store file.
///
/// Usage:
/// ```no_run
/// use blobstore::{BlobStoreWriter, FileBlobStoreWriter};
///
/// let writer = FileBlobStoreWriter::builder()
///     .blob_file("store.blob")
///     .overwrite(true)
///     .build()
///     .unwrap();
/// writer.add_entry_gzip_encoded("hello.txt", &b"hello world"[..], Some("text/plain")).unwrap();
/// writer.close().unwrap();
/// ```
pub struct FileBlobStoreWriter {
    blob_path: PathBuf,
    index_file: Option<(PathBuf, File)>,
    defaults: Arc<StoreDefaults>,
    max_index_entries_in_memory: usize,
    chunk_location: ChunkLocation,
    data: Mutex<DataSection>,
    index: Mutex<IndexBuffer>,
    chunks: Mutex<Vec<IndexChunk>>,
}

impl FileBlobStoreWriter {
    /// Start configuring a new writer.
    pub fn builder() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Path of the blob file being written.
    pub fn blob_path(&self) -> &Path {
        &self.blob_path
    }

    /// Path of the separate index file, if one was configured.
    pub fn index_path(&self) -> Option<&Path> {
        self.index_file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Defaults written index lines are relative to.
    pub fn defaults(&self) -> &StoreDefaults {
        &self.defaults
    }

    /// Current end of the data section.
    pub fn data_len(&self) -> u64 {
        self.data.lock().cursor
    }

    /// Number of chunk files spilled so far.
    pub fn spilled_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Start a streamed entry.
    ///
    /// The returned sink collects the contents and appends them as one entry
    /// on [`BlobEntryWriter::finish`].
    pub fn entry_writer(
        &self,
        name: &str,
        media_type: Option<&str>,
        encoding: Option<Encoding>,
    ) -> Result<BlobEntryWriter<'_>> {
        validate_name(name)?;
        if let Some(media_type) = media_type.filter(|m| !m.is_empty()) {
            validate_media_type(media_type)?;
        }
        Ok(BlobEntryWriter {
            writer: self,
            name: name.to_string(),
            media_type: media_type.map(str::to_string),
            encoding,
            buffer: Vec::new(),
            spill: None,
        })
    }

    /// Write a taken batch to a chunk. On failure the writer refuses all
    /// further appends and the close.
    fn spill(&self, seq: u64, batch: Vec<BlobEntry>) -> Result<()> {
        let location = &self.chunk_location;
        match IndexChunk::write(&location.dir, &location.prefix, seq, batch) {
            Ok(chunk) => {
                self.chunks.lock().push(chunk);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to spill index chunk {} of {:?}: {}", seq, self.blob_path, e);
                self.index.lock().failed = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn check_failed(failed: Option<&str>) -> Result<()> {
        match failed {
            Some(cause) => Err(Error::InvalidState(format!(
                "index entries were lost in a failed spill: {}",
                cause
            ))),
            None => Ok(()),
        }
    }
}

impl BlobStoreWriter for FileBlobStoreWriter {
    fn add_entry<R: Read>(
        &self,
        name: &str,
        mut contents: R,
        media_type: Option<&str>,
        encoding: Option<Encoding>,
    ) -> Result<()> {
        // Reject bad metadata before any bytes hit the data section
        validate_name(name)?;
        if let Some(media_type) = media_type.filter(|m| !m.is_empty()) {
            validate_media_type(media_type)?;
        }
        Self::check_failed(self.index.lock().failed.as_deref())?;

        let batch = {
            let mut data = self.data.lock();
            let offset = data.cursor;
            io::copy(&mut contents, &mut *data)?;
            let length = data.cursor - offset;
            let defaults = Arc::clone(&self.defaults);
            let entry = BlobEntry::new(name, offset, length, media_type, encoding, defaults)?;

            // index order must match append order
            let mut index = self.index.lock();
            drop(data);
            Self::check_failed(index.failed.as_deref())?;
            index.entries.push(entry);
            let max = self.max_index_entries_in_memory;
            if max > 0 && index.entries.len() >= max {
                let seq = index.next_seq;
                index.next_seq += 1;
                Some((seq, mem::take(&mut index.entries)))
            } else {
                None
            }
        };

        if let Some((seq, batch)) = batch {
            self.spill(seq, batch)?;
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        let FileBlobStoreWriter {
            blob_path,
            index_file,
            chunk_location,
            data,
            index,
            chunks,
            ..
        } = self;
        let IndexBuffer { entries, next_seq, failed } = index.into_inner();
        // The placeholder header stays, so the file never opens as a store
        Self::check_failed(failed.as_deref())?;
        let DataSection { out, cursor: data_end } = data.into_inner();
        let mut chunks = chunks.into_inner();

        let source = if chunks.is_empty() {
            IndexSource::Resident(entries)
        } else {
            if !entries.is_empty() {
                let ChunkLocation { dir, prefix } = &chunk_location;
                chunks.push(IndexChunk::write(dir, prefix, next_seq, entries)?);
            }
            IndexSource::Chunks(chunks)
        };
        finish(blob_path, index_file, out, data_end, source)
    }
}

enum IndexSource {
    Resident(Vec<BlobEntry>),
    Chunks(Vec<IndexChunk>),
}

/// Write the index section, then patch the header.
fn finish(
    blob_path: PathBuf,
    index_file: Option<(PathBuf, File)>,
    mut out: BufWriter<File>,
    data_end: u64,
    source: IndexSource,
) -> Result<()> {
    let lines = match index_file {
        Some((index_path, file)) => {
            let mut index_out = BufWriter::new(file);
            let lines = write_index(&mut index_out, source)?;
            index_out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            log::info!("Wrote {} index lines to {:?}", lines, index_path);
            lines
        }
        None => write_index(&mut out, source)?,
    };

    let mut file = out.into_inner().map_err(|e| e.into_error())?;
    header::write_at_start(&mut file, data_end)?;
    file.sync_all()?;

    log::info!(
        "Closed blob store {:?}: {} entries, {} data bytes",
        blob_path,
        lines,
        data_end - HEADER_LEN
    );
    Ok(())
}

fn write_index<W: Write>(out: &mut W, source: IndexSource) -> Result<u64> {
    match source {
        IndexSource::Resident(entries) => {
            let entries = sort_entries(entries);
            for entry in &entries {
                entry.write_line(out)?;
            }
            out.flush()?;
            Ok(entries.len() as u64)
        }
        IndexSource::Chunks(mut chunks) => {
            chunks.sort_by_key(IndexChunk::seq);
            let runs = chunks.iter().map(IndexChunk::open).collect::<Result<Vec<_>>>()?;
            let stats = merge_sorted_runs(runs, out)?;
            out.flush()?;
            let spilled: usize = chunks.iter().map(IndexChunk::entry_count).sum();
            log::info!(
                "Merged {} index chunks ({} entries spilled): {} lines read, {} written",
                chunks.len(),
                spilled,
                stats.lines_read,
                stats.lines_written
            );
            for chunk in chunks {
                chunk.remove()?;
            }
            Ok(stats.lines_written)
        }
    }
}

/// Builder for [`FileBlobStoreWriter`].
#[derive(Debug, Default)]
pub struct WriterBuilder {
    blob_file: Option<PathBuf>,
    index_file: Option<PathBuf>,
    default_media_type: Option<String>,
    options: WriterOptions,
}

impl WriterBuilder {
    /// Blob file to create. Required.
    pub fn blob_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.blob_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Write the index section to this file instead of the blob file.
    pub fn index_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.index_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace existing files instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    /// Store defaults.
    pub fn defaults(mut self, defaults: StoreDefaults) -> Self {
        self.options.defaults = defaults;
        self
    }

    /// Default media type, overriding the one in `defaults`.
    pub fn default_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.default_media_type = Some(media_type.into());
        self
    }

    /// Default encoding, keeping the current default media type.
    pub fn default_encoding(mut self, encoding: Encoding) -> Self {
        self.options.defaults = self.options.defaults.with_encoding(encoding);
        self
    }

    /// Spill threshold for buffered index entries; 0 disables spilling.
    pub fn max_index_entries_in_memory(mut self, max: usize) -> Self {
        self.options.max_index_entries_in_memory = max;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Create the target files and return the writer.
    pub fn build(mut self) -> Result<FileBlobStoreWriter> {
        if let Some(media_type) = self.default_media_type.take() {
            self.options.defaults = self.options.defaults.with_media_type(media_type)?;
        }
        self.options.validate()?;
        let blob_path = self
            .blob_file
            .ok_or_else(|| Error::invalid_argument("blob file is required"))?;
        if self.index_file.as_deref() == Some(blob_path.as_path()) {
            return Err(Error::invalid_argument(format!(
                "blob file and index file must differ: {:?}",
                blob_path
            )));
        }

        prepare_target(&blob_path, self.options.overwrite)?;
        let index_file = match self.index_file {
            Some(index_path) => {
                prepare_target(&index_path, self.options.overwrite)?;
                let file = File::create(&index_path)?;
                Some((index_path, file))
            }
            None => None,
        };

        let mut file = File::create(&blob_path)?;
        file.write_all(header::PLACEHOLDER)?;

        let chunk_location = ChunkLocation {
            dir: match blob_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
            prefix: blob_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        log::debug!("Created blob store {:?}", blob_path);
        Ok(FileBlobStoreWriter {
            blob_path,
            index_file,
            defaults: Arc::new(self.options.defaults),
            max_index_entries_in_memory: self.options.max_index_entries_in_memory,
            chunk_location,
            data: Mutex::new(DataSection { out: BufWriter::new(file), cursor: HEADER_LEN }),
            index: Mutex::new(IndexBuffer { entries: Vec::new(), next_seq: 0, failed: None }),
            chunks: Mutex::new(Vec::new()),
        })
    }
}

fn prepare_target(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            return Err(Error::AlreadyExists(path.to_path_buf()));
        }
        fs::remove_file(path)?;
    }
    Ok(())
}

/// A `Write` sink that becomes one entry on [`finish`](Self::finish).
///
/// Contents are held in memory up to [`ENTRY_WRITER_MEMORY_LIMIT`], then in
/// an anonymous temp file. Dropping the writer without finishing discards
/// the entry.
pub struct BlobEntryWriter<'a> {
    writer: &'a FileBlobStoreWriter,
    name: String,
    media_type: Option<String>,
    encoding: Option<Encoding>,
    buffer: Vec<u8>,
    spill: Option<File>,
}

impl BlobEntryWriter<'_> {
    /// Append the collected bytes to the store.
    pub fn finish(mut self) -> Result<()> {
        let media_type = self.media_type.as_deref();
        match self.spill.as_mut() {
            Some(file) => {
                file.flush()?;
                file.seek(SeekFrom::Start(0))?;
                self.writer.add_entry(&self.name, file, media_type, self.encoding)
            }
            None => {
                let contents = self.buffer.as_slice();
                self.writer.add_entry(&self.name, contents, media_type, self.encoding)
            }
        }
    }
}

impl Write for BlobEntryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(file) = self.spill.as_mut() {
            return file.write(buf);
        }
        if self.buffer.len() + buf.len() > ENTRY_WRITER_MEMORY_LIMIT {
            let mut file = tempfile::tempfile()?;
            file.write_all(&self.buffer)?;
            self.buffer = Vec::new();
            let n = file.write(buf)?;
            self.spill = Some(file);
            return Ok(n);
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.spill.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}
