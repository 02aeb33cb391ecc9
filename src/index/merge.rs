//! Multi-way merge of sorted index line runs.
//!
//! Each run is a line source already sorted by entry name. The merge keeps
//! one head line per run in a min-heap, so memory stays O(number of runs).
//! Lines sharing a key are collapsed to the one that was appended last:
//! ties are ordered by run sequence and runs keep insertion order internally,
//! so the last line popped for a key is the newest one.

use crate::error::{Error, Result};
use crate::index::entry::parse_key;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::{BufRead, Write};

/// Counters reported by a finished merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Lines read from all runs.
    pub lines_read: u64,
    /// Lines written after duplicate suppression.
    pub lines_written: u64,
}

/// Head line of one run in the merge heap
struct HeapEntry {
    line: String,
    key_len: usize,
    run: usize,
}

impl HeapEntry {
    fn key(&self) -> &[u8] {
        &self.line.as_bytes()[..self.key_len]
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal keys pop in run order
        other.key().cmp(self.key()).then_with(|| other.run.cmp(&self.run))
    }
}

/// One sorted input. The reader is dropped as soon as it is exhausted.
struct Run<R> {
    reader: Option<R>,
    buf: String,
}

impl<R: BufRead> Run<R> {
    fn next_line(&mut self, run: usize) -> Result<Option<HeapEntry>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        self.buf.clear();
        if reader.read_line(&mut self.buf)? == 0 {
            self.reader = None;
            return Ok(None);
        }
        let line = self.buf.strip_suffix('\n').unwrap_or(&self.buf).to_string();
        let key_len = parse_key(&line)?.len();
        Ok(Some(HeapEntry { line, key_len, run }))
    }
}

/// Merge sorted runs into `out`, one line per distinct key.
///
/// Runs must be given in append order. On error the output is incomplete and
/// must be discarded; all runs are dropped either way.
pub fn merge_sorted_runs<R, W>(runs: Vec<R>, out: &mut W) -> Result<MergeStats>
where
    R: BufRead,
    W: Write,
{
    let mut runs: Vec<Run<R>> =
        runs.into_iter().map(|r| Run { reader: Some(r), buf: String::new() }).collect();
    let mut heap = BinaryHeap::with_capacity(runs.len());
    let mut stats = MergeStats::default();

    for (idx, run) in runs.iter_mut().enumerate() {
        if let Some(head) = run.next_line(idx)? {
            heap.push(head);
        }
    }

    let mut pending: Option<HeapEntry> = None;
    while let Some(entry) = heap.pop() {
        stats.lines_read += 1;
        if let Some(next) = runs[entry.run].next_line(entry.run)? {
            if next.key() < entry.key() {
                return Err(Error::format(format!(
                    "Index run {} is not sorted: {:?} follows {:?}",
                    entry.run, next.line, entry.line
                )));
            }
            heap.push(next);
        }

        match pending.take() {
            Some(prev) if prev.key() != entry.key() => {
                write_line(out, &prev.line)?;
                stats.lines_written += 1;
            }
            _ => {}
        }
        pending = Some(entry);
    }

    if let Some(last) = pending {
        write_line(out, &last.line)?;
        stats.lines_written += 1;
    }
    Ok(stats)
}

fn write_line<W: Write>(out: &mut W, line: &str) -> Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    Ok(())
}
