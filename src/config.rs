//! Configuration options for blob store readers and writers.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Media type used when an entry does not specify one.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Default number of index entries buffered before a chunk is spilled to disk.
pub const DEFAULT_MAX_INDEX_ENTRIES_IN_MEMORY: usize = 100_000;

/// Default number of binary search probes memoized per lookup.
pub const DEFAULT_POSITION_CACHE_DEPTH: usize = 20;

/// Content encoding of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Bytes are stored as given.
    Identity,

    /// Bytes are stored gzip compressed.
    Gzip,
}

impl Encoding {
    /// The token used for this encoding in index lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Gzip => "gzip",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "identity" => Ok(Encoding::Identity),
            "gzip" => Ok(Encoding::Gzip),
            other => Err(Error::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Store-wide fallback media type and encoding.
///
/// Index lines omit the media type and encoding of an entry when they equal
/// these defaults, so a reader must be opened with the same defaults the
/// writer used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDefaults {
    media_type: String,
    encoding: Encoding,
}

impl StoreDefaults {
    /// Creates new defaults. The media type must be non-empty printable US-ASCII.
    pub fn new(media_type: impl Into<String>, encoding: Encoding) -> Result<Self> {
        let media_type = media_type.into();
        validate_media_type(&media_type)?;
        Ok(Self { media_type, encoding })
    }

    /// Default media type.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Default encoding.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Returns a copy with a different media type.
    pub fn with_media_type(&self, media_type: impl Into<String>) -> Result<Self> {
        Self::new(media_type, self.encoding)
    }

    /// Returns a copy with a different encoding.
    pub fn with_encoding(&self, encoding: Encoding) -> Self {
        Self { media_type: self.media_type.clone(), encoding }
    }
}

impl Default for StoreDefaults {
    fn default() -> Self {
        Self { media_type: DEFAULT_MEDIA_TYPE.to_string(), encoding: Encoding::Gzip }
    }
}

/// Media types are the last field of an index line, so they may contain `;`
/// but never a line break or non-ASCII bytes.
pub(crate) fn validate_media_type(media_type: &str) -> Result<()> {
    if media_type.is_empty() {
        return Err(Error::invalid_argument("media type must not be empty"));
    }
    if let Some(b) = media_type.bytes().find(|b| !(0x20..=0x7e).contains(b)) {
        return Err(Error::invalid_argument(format!(
            "media type contains illegal byte {:#04x}: {:?}",
            b, media_type
        )));
    }
    Ok(())
}

/// Configuration options for a blob store writer.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Number of index entries kept in memory before a sorted chunk is
    /// spilled to disk. 0 disables spilling, all entries stay resident.
    /// Default: 100_000
    pub max_index_entries_in_memory: usize,

    /// Delete pre-existing target files instead of failing.
    /// Default: false
    pub overwrite: bool,

    /// Store defaults used when writing index lines.
    /// Default: `application/octet-stream`, `gzip`
    pub defaults: StoreDefaults,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            max_index_entries_in_memory: DEFAULT_MAX_INDEX_ENTRIES_IN_MEMORY,
            overwrite: false,
            defaults: StoreDefaults::default(),
        }
    }
}

impl WriterOptions {
    /// Creates new WriterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the spill threshold for index entries.
    pub fn max_index_entries_in_memory(mut self, value: usize) -> Self {
        self.max_index_entries_in_memory = value;
        self
    }

    /// Sets whether existing target files are replaced.
    pub fn overwrite(mut self, value: bool) -> Self {
        self.overwrite = value;
        self
    }

    /// Sets the store defaults.
    pub fn defaults(mut self, defaults: StoreDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        validate_media_type(self.defaults.media_type())
    }
}

/// Configuration options for a blob store reader.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Number of binary search probes per lookup whose lines are memoized.
    /// 0 disables the position cache.
    /// Default: 20
    pub position_cache_depth: usize,

    /// Store defaults used to resolve omitted index fields.
    /// Default: `application/octet-stream`, `gzip`
    pub defaults: StoreDefaults,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            position_cache_depth: DEFAULT_POSITION_CACHE_DEPTH,
            defaults: StoreDefaults::default(),
        }
    }
}

impl ReaderOptions {
    /// Creates new ReaderOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position cache depth.
    pub fn position_cache_depth(mut self, depth: usize) -> Self {
        self.position_cache_depth = depth;
        self
    }

    /// Sets the store defaults.
    pub fn defaults(mut self, defaults: StoreDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}
