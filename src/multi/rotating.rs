//! Writer spreading entries over numbered blob store files.

use crate::config::{Encoding, StoreDefaults, WriterOptions};
use crate::error::{Error, Result};
use crate::store::{BlobStoreWriter, FileBlobStoreWriter};
use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default file name suffix of rotated stores.
pub const DEFAULT_SUFFIX: &str = ".blob";

struct RotationState {
    current: Option<FileBlobStoreWriter>,
    entries_in_current: usize,
    files: Vec<PathBuf>,
    next_index: usize,
}

/// Writes entries to a sequence of blob store files, starting a new file
/// once the current one holds `max_entry_count_per_file` entries.
///
/// Files are named `{prefix}{index:03}{suffix}` inside the target directory.
/// The first file is created on the first append.
pub struct RotatingFileBlobStoreWriter {
    directory: PathBuf,
    prefix: String,
    suffix: String,
    max_entry_count_per_file: usize,
    options: WriterOptions,
    state: Mutex<RotationState>,
}

impl RotatingFileBlobStoreWriter {
    /// Start configuring a rotating writer.
    pub fn builder() -> RotatingWriterBuilder {
        RotatingWriterBuilder::default()
    }

    /// Files created so far, in creation order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.state.lock().files.clone()
    }

    /// Directory the files are created in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(&self, index: usize) -> PathBuf {
        self.directory.join(format!("{}{:03}{}", self.prefix, index, self.suffix))
    }

    /// Close the current file, if any, and open the next unused one.
    fn rotate(&self, state: &mut RotationState) -> Result<()> {
        if let Some(previous) = state.current.take() {
            previous.close()?;
        }

        let mut path = self.file_name(state.next_index);
        while !self.options.overwrite && path.exists() {
            state.next_index += 1;
            path = self.file_name(state.next_index);
        }
        state.next_index += 1;

        let writer = FileBlobStoreWriter::builder()
            .blob_file(&path)
            .options(self.options.clone())
            .build()?;
        log::info!("Rotated to blob store {:?}", path);

        state.files.push(path);
        state.current = Some(writer);
        state.entries_in_current = 0;
        Ok(())
    }
}

impl BlobStoreWriter for RotatingFileBlobStoreWriter {
    fn add_entry<R: Read>(
        &self,
        name: &str,
        contents: R,
        media_type: Option<&str>,
        encoding: Option<Encoding>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.current.is_none() || state.entries_in_current >= self.max_entry_count_per_file {
            self.rotate(&mut state)?;
        }

        let writer = state
            .current
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no open blob store after rotation".to_string()))?;
        writer.add_entry(name, contents, media_type, encoding)?;
        state.entries_in_current += 1;
        Ok(())
    }

    fn close(self) -> Result<()> {
        let state = self.state.into_inner();
        match state.current {
            Some(writer) => writer.close(),
            None => Ok(()),
        }
    }
}

/// Builder for [`RotatingFileBlobStoreWriter`].
#[derive(Debug)]
pub struct RotatingWriterBuilder {
    directory: Option<PathBuf>,
    prefix: String,
    suffix: String,
    max_entry_count_per_file: usize,
    options: WriterOptions,
}

impl Default for RotatingWriterBuilder {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: String::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
            max_entry_count_per_file: 0,
            options: WriterOptions::default(),
        }
    }
}

impl RotatingWriterBuilder {
    /// Directory to create files in. Required.
    pub fn directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.directory = Some(directory.as_ref().to_path_buf());
        self
    }

    /// File name prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// File name suffix (default: `.blob`).
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Entries per file before rotating. Required, must be positive.
    pub fn max_entry_count_per_file(mut self, max: usize) -> Self {
        self.max_entry_count_per_file = max;
        self
    }

    /// Replace existing files instead of skipping their names.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    /// Store defaults for every file.
    pub fn defaults(mut self, defaults: StoreDefaults) -> Self {
        self.options.defaults = defaults;
        self
    }

    /// Spill threshold for buffered index entries of each file.
    pub fn max_index_entries_in_memory(mut self, max: usize) -> Self {
        self.options.max_index_entries_in_memory = max;
        self
    }

    /// Build the writer. No file is created until the first entry.
    pub fn build(self) -> Result<RotatingFileBlobStoreWriter> {
        let directory = self
            .directory
            .ok_or_else(|| Error::invalid_argument("directory is required"))?;
        if self.max_entry_count_per_file == 0 {
            return Err(Error::invalid_argument("max_entry_count_per_file must be positive"));
        }
        if !directory.is_dir() {
            return Err(Error::invalid_argument(format!("not a directory: {:?}", directory)));
        }
        self.options.validate()?;

        Ok(RotatingFileBlobStoreWriter {
            directory,
            prefix: self.prefix,
            suffix: self.suffix,
            max_entry_count_per_file: self.max_entry_count_per_file,
            options: self.options,
            state: Mutex::new(RotationState {
                current: None,
                entries_in_current: 0,
                files: Vec::new(),
                next_index: 0,
            }),
        })
    }
}
