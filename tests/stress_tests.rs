// Stress Tests
// These tests are marked with #[ignore] and are intended to be run manually
// Run with: cargo test --release -- --ignored --nocapture

use blobstore::{BlobStoreReader, BlobStoreWriter, FileBlobStoreReader, FileBlobStoreWriter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tempfile::TempDir;

/// One million entries through the external merge
#[test]
#[ignore]
fn stress_million_entries_spilled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("million.blob");
    let count = 1_000_000;

    let start = Instant::now();
    let writer = FileBlobStoreWriter::builder().blob_file(&path).build().unwrap();
    for i in 0..count {
        let name = format!("entry/{:07}", (i * 7919) % count);
        writer.add_entry_unencoded(&name, &b"x"[..], None).unwrap();
    }
    writer.close().unwrap();
    println!("Wrote {} entries in {:?}", count, start.elapsed());

    let reader = FileBlobStoreReader::open(&path).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let start = Instant::now();
    for _ in 0..100_000 {
        let i = rng.random_range(0..count);
        assert!(reader.get_entry(&format!("entry/{:07}", i)).unwrap().is_some());
    }
    println!("100k random lookups in {:?}", start.elapsed());
}

/// Many threads looking up in one large store
#[test]
#[ignore]
fn stress_parallel_lookups() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("parallel.blob");
    let count = 200_000;

    let writer = FileBlobStoreWriter::builder().blob_file(&path).build().unwrap();
    for i in 0..count {
        let value = format!("value {}", i);
        writer.add_entry_gzip_encoded(&format!("k{}", i), value.as_bytes(), None).unwrap();
    }
    writer.close().unwrap();

    let reader = Arc::new(FileBlobStoreReader::open(&path).unwrap());
    let start = Instant::now();
    let handles: Vec<_> = (0..16)
        .map(|t| {
            let reader = Arc::clone(&reader);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(t);
                for _ in 0..20_000 {
                    let i = rng.random_range(0..count);
                    assert!(reader.get_entry(&format!("k{}", i)).unwrap().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    println!("320k parallel lookups in {:?}", start.elapsed());
}
