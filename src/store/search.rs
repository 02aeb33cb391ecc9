//! Binary search over a sorted, line-based index section.
//!
//! The index section is plain text, so a probe cannot land on a record
//! boundary directly. Each probe at byte position `pos` instead yields the
//! first complete line starting strictly after `pos`: the (possibly partial)
//! line containing `pos` is skipped. No probe can therefore return the very
//! first line of the section, which is fetched separately from the exact
//! index start and checked before the search proper begins.

use crate::error::{Error, Result};
use crate::index::entry::{compare_names, parse_key};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{BufRead, Seek, SeekFrom};
use std::sync::Arc;

/// Where a probe reads its line from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbePosition {
    /// The line starting exactly at the index start.
    IndexStart,
    /// The first line starting after the byte position.
    After(u64),
}

/// Memoized probe results shared by all lookups against one store.
///
/// Only the first `depth` probes of each search are cached, so the cache is
/// bounded by the positions those probes can reach. Entries never expire;
/// when two lookups race to fill a position the first insert is kept.
#[derive(Debug)]
pub struct PositionCache {
    depth: usize,
    lines: RwLock<HashMap<ProbePosition, Arc<str>>>,
}

impl PositionCache {
    /// Create a cache for the first `depth` probes of each search.
    pub fn new(depth: usize) -> Self {
        Self { depth, lines: RwLock::new(HashMap::new()) }
    }

    /// Number of probes per search that use the cache.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Cached line for a position.
    pub fn get(&self, position: &ProbePosition) -> Option<Arc<str>> {
        self.lines.read().get(position).cloned()
    }

    /// Cache a line unless the position is already filled.
    pub fn insert(&self, position: ProbePosition, line: Arc<str>) {
        self.lines.write().entry(position).or_insert(line);
    }

    /// Number of cached positions.
    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    /// Whether nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }
}

/// Random access to the lines of an index section.
pub trait IndexLines {
    /// The line starting exactly at the index start.
    fn first_line(&mut self) -> Result<Option<String>>;

    /// The first complete line starting strictly after `pos`.
    fn line_after(&mut self, pos: u64) -> Result<Option<String>>;
}

/// [`IndexLines`] over the byte range `[start, end)` of a seekable reader.
pub struct SeekableIndexLines<R> {
    reader: R,
    start: u64,
    end: u64,
    buf: Vec<u8>,
}

impl<R: BufRead + Seek> SeekableIndexLines<R> {
    /// Wrap a reader whose index section spans `[start, end)`.
    pub fn new(reader: R, start: u64, end: u64) -> Self {
        Self { reader, start, end, buf: Vec::new() }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if !self.buf.is_ascii() {
            return Err(Error::format("Index line is not US-ASCII"));
        }
        let line = String::from_utf8(std::mem::take(&mut self.buf))
            .map_err(|_| Error::format("Index line is not US-ASCII"))?;
        Ok(Some(line))
    }
}

impl<R: BufRead + Seek> IndexLines for SeekableIndexLines<R> {
    fn first_line(&mut self) -> Result<Option<String>> {
        if self.start >= self.end {
            return Ok(None);
        }
        self.reader.seek(SeekFrom::Start(self.start))?;
        self.read_line()
    }

    fn line_after(&mut self, pos: u64) -> Result<Option<String>> {
        if pos >= self.end {
            return Ok(None);
        }
        self.reader.seek(SeekFrom::Start(pos))?;

        self.buf.clear();
        let skipped = self.reader.read_until(b'\n', &mut self.buf)? as u64;
        if skipped == 0 || pos + skipped >= self.end {
            return Ok(None);
        }
        self.read_line()
    }
}

/// One lookup session over an index section.
pub struct IndexSearch<'a, L> {
    lines: L,
    start: u64,
    end: u64,
    cache: Option<&'a PositionCache>,
}

impl<'a, L: IndexLines> IndexSearch<'a, L> {
    /// Search the index section spanning `[start, end)`.
    pub fn new(lines: L, start: u64, end: u64, cache: Option<&'a PositionCache>) -> Self {
        Self { lines, start, end, cache }
    }

    /// Find the index line for `name`.
    pub fn find(&mut self, name: &str) -> Result<Option<Arc<str>>> {
        let Some(first) = self.probe(ProbePosition::IndexStart, 0)? else {
            return Ok(None);
        };
        match compare_names(parse_key(&first)?, name) {
            Ordering::Equal => return Ok(Some(first)),
            // the index is sorted, nothing below the first line
            Ordering::Greater => return Ok(None),
            Ordering::Less => {}
        }

        let mut lo = self.start;
        let mut hi = self.end;
        let mut iteration = 0;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let ordering = match self.probe(ProbePosition::After(mid), iteration)? {
                // ran past the last line, look before
                None => Ordering::Greater,
                Some(line) => {
                    let ordering = compare_names(parse_key(&line)?, name);
                    if ordering == Ordering::Equal {
                        return Ok(Some(line));
                    }
                    ordering
                }
            };
            if ordering == Ordering::Greater {
                match mid.checked_sub(1) {
                    Some(below) => hi = below,
                    None => break,
                }
            } else {
                lo = mid + 1;
            }
            iteration += 1;
        }

        // The range narrowed to nothing; the line after `lo` is the only candidate left.
        match self.probe(ProbePosition::After(lo), iteration)? {
            Some(line) if parse_key(&line)? == name => Ok(Some(line)),
            _ => {
                log::debug!("No index entry for {:?}", name);
                Ok(None)
            }
        }
    }

    fn probe(&mut self, position: ProbePosition, iteration: usize) -> Result<Option<Arc<str>>> {
        let cache = self.cache.filter(|c| iteration < c.depth());
        if let Some(line) = cache.and_then(|c| c.get(&position)) {
            return Ok(Some(line));
        }

        let line = match position {
            ProbePosition::IndexStart => self.lines.first_line()?,
            ProbePosition::After(pos) => self.lines.line_after(pos)?,
        };
        let Some(line) = line else {
            return Ok(None);
        };
        let line: Arc<str> = Arc::from(line);
        if let Some(cache) = cache {
            cache.insert(position, Arc::clone(&line));
        }
        Ok(Some(line))
    }
}
