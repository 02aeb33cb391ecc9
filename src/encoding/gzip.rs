//! Pull-based streaming gzip compression.
//!
//! [`GzipCompressingReader`] wraps a plaintext reader and yields its gzip
//! compressed form through [`Read`]. The compressor is push oriented, so
//! every refill pulls one buffer of plaintext, feeds it to the encoder and
//! queues whatever compressed bytes the encoder emitted. Neither the whole
//! plaintext nor the whole compressed output is held in memory.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// Size of the plaintext pull buffer.
pub const PULL_BUFFER_SIZE: usize = 4096;

/// Reader producing the gzip compressed form of another reader.
pub struct GzipCompressingReader<R: Read> {
    inner: Option<R>,
    encoder: Option<GzEncoder<Vec<u8>>>,
    chunks: VecDeque<Vec<u8>>,
    chunk_pos: usize,
    input_done: bool,
    buf: Vec<u8>,
}

impl<R: Read> GzipCompressingReader<R> {
    /// Wrap `inner` using the default compression level.
    pub fn new(inner: R) -> Self {
        Self::with_level(inner, Compression::default())
    }

    /// Wrap `inner` using the given compression level.
    pub fn with_level(inner: R, level: Compression) -> Self {
        Self {
            inner: Some(inner),
            encoder: Some(GzEncoder::new(Vec::new(), level)),
            chunks: VecDeque::new(),
            chunk_pos: 0,
            input_done: false,
            buf: vec![0u8; PULL_BUFFER_SIZE],
        }
    }

    /// Finish the compressor and release the wrapped reader, regardless of
    /// how much has been read. Later reads report end of stream.
    pub fn close(&mut self) -> io::Result<()> {
        self.chunks.clear();
        self.chunk_pos = 0;
        self.input_done = true;
        self.inner = None;
        if let Some(encoder) = self.encoder.take() {
            encoder.finish()?;
        }
        Ok(())
    }

    /// Pull one buffer of plaintext through the encoder.
    fn fill(&mut self) -> io::Result<()> {
        let n = match self.inner.as_mut() {
            Some(inner) => loop {
                match inner.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            },
            None => 0,
        };

        if n == 0 {
            self.input_done = true;
            self.inner = None;
            if let Some(encoder) = self.encoder.take() {
                let tail = encoder.finish()?;
                self.push_chunk(tail);
            }
            return Ok(());
        }

        if let Some(encoder) = self.encoder.as_mut() {
            encoder.write_all(&self.buf[..n])?;
            let produced = std::mem::take(encoder.get_mut());
            self.push_chunk(produced);
        }
        Ok(())
    }

    fn push_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.chunks.push_back(chunk);
        }
    }
}

impl<R: Read> Read for GzipCompressingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.chunks.is_empty() {
            if self.input_done {
                return Ok(0);
            }
            self.fill()?;
        }

        let Some(front) = self.chunks.front() else {
            return Ok(0);
        };
        let available = &front[self.chunk_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);

        if n == available.len() {
            self.chunks.pop_front();
            self.chunk_pos = 0;
        } else {
            self.chunk_pos += n;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use rand::{Rng, SeedableRng};

    fn payload(len: usize) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(len as u64);
        // half random, half repetitive so both stored and compressed blocks appear
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..len / 2]);
        for (i, b) in data[len / 2..].iter_mut().enumerate() {
            *b = b"blobstore"[i % 9];
        }
        data
    }

    fn compress_all(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzipCompressingReader::new(data).read_to_end(&mut out).unwrap();
        out
    }

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        GzDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    /// Read using a repeating pattern of requested sizes.
    fn compress_with_pattern(data: &[u8], pattern: &[usize]) -> Vec<u8> {
        let mut reader = GzipCompressingReader::new(data);
        let mut out = Vec::new();
        let mut buf = vec![0u8; pattern.iter().copied().max().unwrap_or(1).max(1)];
        let mut zero_reads = 0;
        for size in pattern.iter().cycle() {
            let n = reader.read(&mut buf[..*size]).unwrap();
            if n == 0 {
                if *size == 0 {
                    zero_reads += 1;
                    assert!(zero_reads < 1_000_000, "zero-length reads only");
                    continue;
                }
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_roundtrip_sizes() {
        let sizes = [0, 1, 100, PULL_BUFFER_SIZE - 1, PULL_BUFFER_SIZE, PULL_BUFFER_SIZE + 1];
        for len in sizes.into_iter().chain([200_000]) {
            let data = payload(len);
            assert_eq!(gunzip(&compress_all(&data)), data, "length {}", len);
        }
    }

    #[test]
    fn test_empty_input_is_valid_gzip() {
        let compressed = compress_all(&[]);
        assert!(!compressed.is_empty());
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
        assert!(gunzip(&compressed).is_empty());
    }

    #[test]
    fn test_read_patterns_yield_identical_output() {
        let data = payload(50_000);
        let expected = compress_all(&data);

        let patterns: [&[usize]; 6] = [
            &[1],
            &[0, 1],
            &[7, 4096, 1],
            &[1_000_000],
            &[3, 0, 65536, 1, 1, 1],
            &[PULL_BUFFER_SIZE],
        ];
        for pattern in patterns {
            assert_eq!(compress_with_pattern(&data, pattern), expected, "pattern {:?}", pattern);
        }
    }

    #[test]
    fn test_zero_length_read_does_not_consume() {
        let mut reader = GzipCompressingReader::new(&b"hello"[..]);
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(gunzip(&out), b"hello");
    }

    struct Tracked<'a> {
        data: &'a [u8],
        dropped: &'a std::cell::Cell<bool>,
    }

    impl Read for Tracked<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl Drop for Tracked<'_> {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    #[test]
    fn test_close_after_partial_read_releases_inner() {
        let data = payload(100_000);
        let dropped = std::cell::Cell::new(false);
        let mut reader = GzipCompressingReader::new(Tracked { data: &data, dropped: &dropped });

        let mut buf = [0u8; 16];
        assert!(reader.read(&mut buf).unwrap() > 0);
        assert!(!dropped.get());

        reader.close().unwrap();
        assert!(dropped.get());
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_inner_released_at_end_of_input() {
        let dropped = std::cell::Cell::new(false);
        let mut reader = GzipCompressingReader::new(Tracked { data: b"abc", dropped: &dropped });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(dropped.get());
        assert_eq!(gunzip(&out), b"abc");
    }
}
