//! Blob file header.
//!
//! The header is 32 bytes of ASCII at the start of every blob file:
//!
//! ```text
//! indexOffset=0000000000000001234\n
//! ```
//!
//! It has a fixed width so the writer can reserve it up front and patch in
//! the index offset once the index section has been written.

use crate::error::{Error, Result};
use crate::store::HEADER_SIZE;
use std::io::{Read, Seek, SeekFrom, Write};

/// Header text before the offset digits.
pub const HEADER_PREFIX: &[u8] = b"indexOffset=";

/// Number of decimal digits of the offset field.
pub const OFFSET_DIGITS: usize = 19;

/// Header written while the store is still open.
pub const PLACEHOLDER: &[u8; HEADER_SIZE] = b"indexOffset=___________________\n";

/// Encode a header for the given index offset.
pub fn encode(index_offset: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    let digits = format!("{:0width$}", index_offset, width = OFFSET_DIGITS);
    header[..HEADER_PREFIX.len()].copy_from_slice(HEADER_PREFIX);
    header[HEADER_PREFIX.len()..HEADER_SIZE - 1].copy_from_slice(digits.as_bytes());
    header[HEADER_SIZE - 1] = b'\n';
    header
}

/// Decode a header, returning the index offset.
pub fn decode(header: &[u8]) -> Result<u64> {
    if header.len() != HEADER_SIZE {
        return Err(Error::format(format!(
            "Header size mismatch: expected {}, got {}",
            HEADER_SIZE,
            header.len()
        )));
    }
    if !header.starts_with(HEADER_PREFIX) || header[HEADER_SIZE - 1] != b'\n' {
        return Err(Error::format("Invalid header: missing indexOffset field"));
    }

    let digits = &header[HEADER_PREFIX.len()..HEADER_SIZE - 1];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::format(format!(
            "Invalid header: index offset {:?} is not a decimal number",
            String::from_utf8_lossy(digits)
        )));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::format("Invalid header: index offset out of range"))
}

/// Read and decode the header at the current position.
pub fn read_from<R: Read>(reader: &mut R) -> Result<u64> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    reader.take(HEADER_SIZE as u64).read_to_end(&mut header)?;
    decode(&header)
}

/// Write the header at the start of `file`.
pub fn write_at_start<W: Write + Seek>(file: &mut W, index_offset: u64) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&encode(index_offset))?;
    file.flush()?;
    Ok(())
}
