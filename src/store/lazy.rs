//! Content reader that is only opened when first read.

use std::io::{self, Read};

/// Opens its underlying reader on the first `read` call.
///
/// Visitors that only look at entry metadata never pay for opening the
/// contents. Dropping the `LazyReader` drops (and so closes) whatever was
/// opened.
pub struct LazyReader<F, R> {
    open: Option<F>,
    inner: Option<R>,
}

impl<F, R> LazyReader<F, R>
where
    F: FnOnce() -> io::Result<R>,
    R: Read,
{
    /// Create a reader that calls `open` on first use.
    pub fn new(open: F) -> Self {
        Self { open: Some(open), inner: None }
    }

    /// Whether the underlying reader has been opened.
    pub fn is_opened(&self) -> bool {
        self.inner.is_some()
    }

    fn inner(&mut self) -> io::Result<&mut R> {
        if let Some(open) = self.open.take() {
            self.inner = Some(open()?);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "contents failed to open earlier"))
    }
}

impl<F, R> Read for LazyReader<F, R>
where
    F: FnOnce() -> io::Result<R>,
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner()?.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_not_opened_without_read() {
        let opened = Cell::new(false);
        let reader = LazyReader::new(|| {
            opened.set(true);
            Ok(&b"data"[..])
        });
        assert!(!reader.is_opened());
        drop(reader);
        assert!(!opened.get());
    }

    #[test]
    fn test_opened_on_first_read() {
        let calls = Cell::new(0);
        let mut reader = LazyReader::new(|| {
            calls.set(calls.get() + 1);
            Ok(&b"data"[..])
        });
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"data");
        assert!(reader.is_opened());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_open_error_is_reported() {
        let mut reader = LazyReader::new(|| -> io::Result<&[u8]> {
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
        });
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap_err().kind(), io::ErrorKind::NotFound);
        assert!(reader.read(&mut buf).is_err());
    }
}
