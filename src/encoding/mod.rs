//! Content encoding adapters.
//!
//! Entries are stored either as given (`identity`) or gzip compressed.
//! Writers compress with [`GzipCompressingReader`], and [`decode`] turns
//! contents read back from a store into plaintext.

pub mod gzip;

pub use gzip::GzipCompressingReader;

use crate::config::Encoding;
use flate2::read::GzDecoder;
use std::io::Read;

/// Wrap stored bytes so reading them yields the plaintext.
pub fn decode<'a, R: Read + Send + 'a>(
    encoding: Encoding,
    stored: R,
) -> Box<dyn Read + Send + 'a> {
    match encoding {
        Encoding::Identity => Box::new(stored),
        Encoding::Gzip => Box::new(GzDecoder::new(stored)),
    }
}
