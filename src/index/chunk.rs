//! Sorted index chunks spilled to disk.
//!
//! A chunk is a gzip-compressed text file holding a sorted, duplicate-free
//! batch of index lines. Chunks live next to the blob file and are removed
//! once the final merge has consumed them, or when dropped.

use crate::error::Result;
use crate::index::{sort_entries, BlobEntry};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::TempPath;

/// File name suffix of chunk files.
pub const CHUNK_SUFFIX: &str = ".idxchunk";

/// A spilled chunk of index entries.
#[derive(Debug)]
pub struct IndexChunk {
    seq: u64,
    path: TempPath,
    entries: usize,
}

impl IndexChunk {
    /// Sort `entries` and write them to a new chunk file in `dir`.
    ///
    /// `seq` orders chunks by the time their batch was detached from the
    /// writer's buffer.
    pub fn write(dir: &Path, prefix: &str, seq: u64, entries: Vec<BlobEntry>) -> Result<Self> {
        let entries = sort_entries(entries);
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(CHUNK_SUFFIX)
            .tempfile_in(dir)?;
        let (file, path) = file.into_parts();

        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::fast());
        for entry in &entries {
            entry.write_line(&mut encoder)?;
        }
        encoder.finish()?.flush()?;

        log::info!("Spilled {} index entries to chunk {} ({:?})", entries.len(), seq, path);
        Ok(Self { seq, path, entries: entries.len() })
    }

    /// Sequence number of the chunk.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Path of the chunk file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in the chunk.
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Open the chunk for reading its decompressed lines.
    pub fn open(&self) -> Result<BufReader<GzDecoder<File>>> {
        let file = File::open(&self.path)?;
        Ok(BufReader::new(GzDecoder::new(file)))
    }

    /// Delete the chunk file.
    pub fn remove(self) -> Result<()> {
        self.path.close()?;
        Ok(())
    }
}
