//! Blob entries and their index line encoding.
//!
//! ## Line Format
//!
//! ```text
//! name=offset;length;[encoding];[mediaType]\n
//! ```
//!
//! `encoding` and `mediaType` are left empty when they equal the store
//! defaults. The media type is the last field and runs to the end of the
//! line, so it may itself contain `;`.

use crate::config::{validate_media_type, Encoding, StoreDefaults};
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Separates the entry name from the entry values.
pub const KEY_SEPARATOR: u8 = b'=';

/// Separates the entry values.
pub const FIELD_SEPARATOR: u8 = b';';

/// One named blob in a store.
///
/// Equality and ordering consider the name only.
#[derive(Clone)]
pub struct BlobEntry {
    name: String,
    offset: u64,
    length: u64,
    media_type: Option<String>,
    encoding: Option<Encoding>,
    defaults: Arc<StoreDefaults>,
    shard: Option<usize>,
}

impl BlobEntry {
    /// Create a new entry.
    ///
    /// A media type or encoding equal to the defaults is not stored
    /// separately; an empty media type means "default".
    pub fn new(
        name: impl Into<String>,
        offset: u64,
        length: u64,
        media_type: Option<&str>,
        encoding: Option<Encoding>,
        defaults: Arc<StoreDefaults>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        let media_type = match media_type {
            Some(m) if !m.is_empty() && m != defaults.media_type() => {
                validate_media_type(m)?;
                Some(m.to_string())
            }
            _ => None,
        };
        let encoding = encoding.filter(|e| *e != defaults.encoding());

        Ok(Self { name, offset, length, media_type, encoding, defaults, shard: None })
    }

    /// Entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte offset of the entry contents in the blob file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the stored (possibly compressed) contents in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Media type, falling back to the store default.
    pub fn media_type(&self) -> &str {
        self.media_type.as_deref().unwrap_or_else(|| self.defaults.media_type())
    }

    /// Encoding, falling back to the store default.
    pub fn encoding(&self) -> Encoding {
        self.encoding.unwrap_or_else(|| self.defaults.encoding())
    }

    /// The defaults this entry resolves against.
    pub fn defaults(&self) -> &StoreDefaults {
        &self.defaults
    }

    /// Index of the owning store when the entry came from a multi-file reader.
    pub fn shard(&self) -> Option<usize> {
        self.shard
    }

    pub(crate) fn with_shard(mut self, shard: usize) -> Self {
        self.shard = Some(shard);
        self
    }

    /// Encode the entry as one index line, including the trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(self.name.len() + 32);
        line.push_str(&self.name);
        line.push(KEY_SEPARATOR as char);
        line.push_str(&self.offset.to_string());
        line.push(FIELD_SEPARATOR as char);
        line.push_str(&self.length.to_string());
        line.push(FIELD_SEPARATOR as char);
        if let Some(encoding) = self.encoding {
            line.push_str(encoding.as_str());
        }
        line.push(FIELD_SEPARATOR as char);
        if let Some(media_type) = &self.media_type {
            line.push_str(media_type);
        }
        line.push('\n');
        line
    }

    /// Write the index line for this entry.
    pub fn write_line<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.to_line().as_bytes())?;
        Ok(())
    }

    /// Parse an index line, with or without its trailing newline.
    pub fn parse(line: &str, defaults: &Arc<StoreDefaults>) -> Result<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let name = parse_key(line)?;
        let values = &line[name.len() + 1..];

        let mut fields = values.splitn(4, FIELD_SEPARATOR as char);
        let offset = fields.next().unwrap_or_default();
        let (length, encoding, media_type) = match (fields.next(), fields.next(), fields.next()) {
            (Some(l), Some(e), Some(m)) => (l, e, m),
            _ => {
                return Err(Error::format(format!("Missing fields in index line {:?}", line)));
            }
        };

        let offset = parse_decimal(offset, "offset", line)?;
        let length = parse_decimal(length, "length", line)?;
        let encoding = if encoding.is_empty() {
            None
        } else {
            let parsed = encoding.parse::<Encoding>().map_err(|_| {
                Error::format(format!("Unknown encoding {:?} in index line {:?}", encoding, line))
            })?;
            Some(parsed)
        };
        let media_type = if media_type.is_empty() { None } else { Some(media_type) };

        Self::new(name, offset, length, media_type, encoding, Arc::clone(defaults))
            .map_err(|e| Error::format(format!("{} in index line {:?}", e, line)))
    }
}

impl PartialEq for BlobEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for BlobEntry {}

impl PartialOrd for BlobEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlobEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_names(&self.name, &other.name)
    }
}

impl fmt::Debug for BlobEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobEntry")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("media_type", &self.media_type())
            .field("encoding", &self.encoding())
            .finish()
    }
}

/// Check that a name only uses printable US-ASCII and no `=`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("entry name must not be empty"));
    }
    if let Some(b) = name.bytes().find(|b| !(0x20..=0x7e).contains(b) || *b == KEY_SEPARATOR) {
        return Err(Error::invalid_name(format!(
            "entry name {:?} contains illegal byte {:#04x}",
            name, b
        )));
    }
    Ok(())
}

/// Everything before the first `=` of an index line.
pub fn parse_key(line: &str) -> Result<&str> {
    match line.as_bytes().iter().position(|b| *b == KEY_SEPARATOR) {
        Some(idx) => Ok(&line[..idx]),
        None => Err(Error::format(format!("No key in index line {:?}", line))),
    }
}

/// Byte-wise name order, used for sorting, merging and searching alike.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

fn parse_decimal(field: &str, what: &str, line: &str) -> Result<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::format(format!("Invalid {} {:?} in index line {:?}", what, field, line)));
    }
    field.parse::<u64>().map_err(|e| {
        Error::format(format!("Invalid {} {:?} in index line {:?}: {}", what, field, line, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Arc<StoreDefaults> {
        Arc::new(StoreDefaults::default())
    }

    #[test]
    fn test_line_omits_defaults() {
        let entry = BlobEntry::new("a", 32, 10, None, None, defaults()).unwrap();
        assert_eq!(entry.to_line(), "a=32;10;;\n");
        assert_eq!(entry.media_type(), "application/octet-stream");
        assert_eq!(entry.encoding(), Encoding::Gzip);

        let entry = BlobEntry::new(
            "b",
            0,
            0,
            Some("application/octet-stream"),
            Some(Encoding::Gzip),
            defaults(),
        )
        .unwrap();
        assert_eq!(entry.to_line(), "b=0;0;;\n");
    }

    #[test]
    fn test_line_with_overrides() {
        let (media_type, encoding) = (Some("text/plain"), Some(Encoding::Identity));
        let entry = BlobEntry::new("doc 1", 100, 7, media_type, encoding, defaults()).unwrap();
        assert_eq!(entry.to_line(), "doc 1=100;7;identity;text/plain\n");

        let parsed = BlobEntry::parse(&entry.to_line(), &defaults()).unwrap();
        assert_eq!(parsed.name(), "doc 1");
        assert_eq!(parsed.offset(), 100);
        assert_eq!(parsed.length(), 7);
        assert_eq!(parsed.media_type(), "text/plain");
        assert_eq!(parsed.encoding(), Encoding::Identity);
    }

    #[test]
    fn test_media_type_may_contain_separator() {
        let line = "x=1;2;;text/html; charset=US-ASCII";
        let entry = BlobEntry::parse(line, &defaults()).unwrap();
        assert_eq!(entry.media_type(), "text/html; charset=US-ASCII");
        assert_eq!(entry.encoding(), Encoding::Gzip);
        assert_eq!(entry.to_line(), format!("{}\n", line));
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("abc=1;2;;").unwrap(), "abc");
        assert_eq!(parse_key("a b=c=d").unwrap(), "a b");
        assert!(matches!(parse_key("no key here"), Err(Error::Format(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        let d = defaults();
        assert!(matches!(BlobEntry::parse("a=1;2", &d), Err(Error::Format(_))));
        assert!(matches!(BlobEntry::parse("a=x;2;;", &d), Err(Error::Format(_))));
        assert!(matches!(BlobEntry::parse("a=1;-2;;", &d), Err(Error::Format(_))));
        assert!(matches!(BlobEntry::parse("a=+1;2;;", &d), Err(Error::Format(_))));
        assert!(matches!(BlobEntry::parse("a=1;2;deflate;", &d), Err(Error::Format(_))));
        assert!(matches!(BlobEntry::parse("=1;2;;", &d), Err(Error::Format(_))));
        let overflow = BlobEntry::parse("a=99999999999999999999;2;;", &d);
        assert!(matches!(overflow, Err(Error::Format(_))));
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("Entry A~").is_ok());
        assert!(validate_name(" ").is_ok());
        assert!(matches!(validate_name(""), Err(Error::InvalidName(_))));
        assert!(matches!(validate_name("a=b"), Err(Error::InvalidName(_))));
        assert!(matches!(validate_name("tab\there"), Err(Error::InvalidName(_))));
        assert!(matches!(validate_name("new\nline"), Err(Error::InvalidName(_))));
        assert!(matches!(validate_name("caf\u{e9}"), Err(Error::InvalidName(_))));
        assert!(matches!(validate_name("del\u{7f}"), Err(Error::InvalidName(_))));

        let result = BlobEntry::new("bad=name", 0, 0, None, None, defaults());
        assert!(matches!(result, Err(Error::InvalidName(_))));
    }

    #[test]
    fn test_equality_and_order_by_name_only() {
        let a1 = BlobEntry::new("a", 0, 1, None, None, defaults()).unwrap();
        let a2 = BlobEntry::new("a", 50, 9, Some("text/plain"), None, defaults()).unwrap();
        let b = BlobEntry::new("b", 0, 1, None, None, defaults()).unwrap();
        assert_eq!(a1, a2);
        assert!(a1 < b);
    }
}
