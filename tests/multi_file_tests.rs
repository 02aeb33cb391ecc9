// Multi-File Tests
// These tests verify rotating writers and fan-out reads across several stores

use blobstore::{
    BlobStoreReader, BlobStoreWriter, FileBlobStoreReader, FileBlobStoreWriter,
    MultiFileBlobStoreReader, RotatingFileBlobStoreWriter,
};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use tempfile::TempDir;

/// Test K single-entry stores read back through one multi-file reader
#[test]
fn test_rotating_one_entry_per_file() {
    let dir = TempDir::new().unwrap();
    let count = 25;

    let writer = RotatingFileBlobStoreWriter::builder()
        .directory(dir.path())
        .prefix("shard-")
        .max_entry_count_per_file(1)
        .build()
        .unwrap();
    for i in 0..count {
        let payload = format!("payload {}", i);
        writer.add_entry_gzip_encoded(&format!("item-{}", i), payload.as_bytes(), None).unwrap();
    }
    let files = writer.files();
    writer.close().unwrap();
    assert_eq!(files.len(), count);

    let reader = MultiFileBlobStoreReader::open(&files).unwrap();
    let mut seen = HashMap::new();
    reader
        .visit_entries(&mut |entry, _| {
            let mut data = String::new();
            reader.get_contents_decoded(entry)?.read_to_string(&mut data)?;
            assert!(seen.insert(entry.name().to_string(), data).is_none());
            Ok(())
        })
        .unwrap();

    assert_eq!(seen.len(), count);
    for i in 0..count {
        assert_eq!(seen[&format!("item-{}", i)], format!("payload {}", i));
    }
}

/// Test that every rotated file is a valid standalone store
#[test]
fn test_rotated_files_are_standalone() {
    let dir = TempDir::new().unwrap();
    let writer = RotatingFileBlobStoreWriter::builder()
        .directory(dir.path())
        .suffix(".store")
        .max_entry_count_per_file(10)
        .max_index_entries_in_memory(3)
        .build()
        .unwrap();
    for i in 0..35 {
        writer.add_entry_unencoded(&format!("{:04}", i), &[i as u8][..], None).unwrap();
    }
    let files = writer.files();
    writer.close().unwrap();

    assert_eq!(files.len(), 4);
    let mut total = 0;
    for (n, file) in files.iter().enumerate() {
        assert_eq!(file.file_name().unwrap().to_string_lossy(), format!("{:03}.store", n));
        let reader = FileBlobStoreReader::open(file).unwrap();
        reader
            .visit_entries(&mut |_, _| {
                total += 1;
                Ok(())
            })
            .unwrap();
    }
    assert_eq!(total, 35);
}

/// Test that broken stores are skipped and lookups still succeed
#[test]
fn test_broken_store_is_skipped() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.blob");
    let writer = FileBlobStoreWriter::builder().blob_file(&good).build().unwrap();
    writer.add_entry_unencoded("present", &b"yes"[..], None).unwrap();
    writer.close().unwrap();

    let truncated = dir.path().join("truncated.blob");
    fs::write(&truncated, &fs::read(&good).unwrap()[..20]).unwrap();

    let reader = MultiFileBlobStoreReader::open([&truncated, &good]).unwrap();
    assert_eq!(reader.len(), 1);
    let mut contents = reader.contents_by_name("present").unwrap().unwrap();
    let mut data = Vec::new();
    contents.read_to_end(&mut data).unwrap();
    assert_eq!(data, b"yes");
}

/// Test merging rotated shards back into a single store
#[test]
fn test_merge_shards_into_one() {
    let dir = TempDir::new().unwrap();
    let shards = dir.path().join("shards");
    fs::create_dir(&shards).unwrap();

    let writer = RotatingFileBlobStoreWriter::builder()
        .directory(&shards)
        .max_entry_count_per_file(4)
        .build()
        .unwrap();
    for i in 0..10 {
        let square = format!("{}", i * i);
        writer.add_entry_gzip_encoded(&format!("n{}", i), square.as_bytes(), None).unwrap();
    }
    let files = writer.files();
    writer.close().unwrap();

    let combined = dir.path().join("combined.blob");
    let target = FileBlobStoreWriter::builder().blob_file(&combined).build().unwrap();
    target.merge_from(&MultiFileBlobStoreReader::open(&files).unwrap()).unwrap();
    target.close().unwrap();

    let reader = FileBlobStoreReader::open(&combined).unwrap();
    for i in 0..10 {
        let mut data = String::new();
        let mut contents = reader.decoded_contents_by_name(&format!("n{}", i)).unwrap().unwrap();
        contents.read_to_string(&mut data).unwrap();
        assert_eq!(data, format!("{}", i * i));
    }
}
