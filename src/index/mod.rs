//! Index section handling.
//!
//! The index section is a newline-delimited text listing of all entries,
//! sorted byte-wise by name. Entries are buffered while a store is written;
//! large stores spill sorted chunks to disk which are merged on close.

pub mod chunk;
pub mod entry;
pub mod merge;

pub use chunk::IndexChunk;
pub use entry::{compare_names, parse_key, validate_name, BlobEntry};
pub use merge::{merge_sorted_runs, MergeStats};

/// Sort entries by name, keeping only the last one appended for each name.
///
/// `entries` must be in append order.
pub fn sort_entries(mut entries: Vec<BlobEntry>) -> Vec<BlobEntry> {
    // stable, so equal names stay in append order
    entries.sort();

    let mut sorted: Vec<BlobEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match sorted.last_mut() {
            Some(last) if last.name() == entry.name() => *last = entry,
            _ => sorted.push(entry),
        }
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreDefaults;
    use std::sync::Arc;

    #[test]
    fn test_sort_entries_last_wins() {
        let defaults = Arc::new(StoreDefaults::default());
        let entries = vec![
            BlobEntry::new("b", 0, 1, None, None, Arc::clone(&defaults)).unwrap(),
            BlobEntry::new("a", 1, 1, None, None, Arc::clone(&defaults)).unwrap(),
            BlobEntry::new("b", 2, 1, None, None, Arc::clone(&defaults)).unwrap(),
            BlobEntry::new("b", 3, 1, None, None, Arc::clone(&defaults)).unwrap(),
        ];

        let sorted = sort_entries(entries);
        let summary: Vec<(&str, u64)> = sorted.iter().map(|e| (e.name(), e.offset())).collect();
        assert_eq!(summary, vec![("a", 1), ("b", 3)]);
    }

    #[test]
    fn test_sort_entries_empty() {
        assert!(sort_entries(Vec::new()).is_empty());
    }
}
