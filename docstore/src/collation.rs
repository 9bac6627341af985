//! A small bytewise-sortable codec: a bijection between logical tuples of
//! `(double, map, string)` values and byte sequences whose lexicographic
//! order matches the tuple order. Used exclusively to build and parse the
//! composite `(timestamp, docID)` keys of the expiry index.

use crate::error::{CResult, Error};

const TAG_ARRAY: u8 = 0x05;
const TAG_ARRAY_END: u8 = 0x06;
const TAG_MAP: u8 = 0x07;
const TAG_MAP_END: u8 = 0x08;
const TAG_DOUBLE: u8 = 0x09;
const TAG_STRING: u8 = 0x0a;
const STRING_TERMINATOR: u8 = 0x00;

/// Builds a collatable byte sequence incrementally.
#[derive(Default)]
pub struct CollatableBuilder {
    buf: Vec<u8>,
}

impl CollatableBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn begin_array(&mut self) -> &mut Self {
        self.buf.push(TAG_ARRAY);
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.buf.push(TAG_ARRAY_END);
        self
    }

    /// Writes an empty map (the expiry key's reserved placeholder field).
    pub fn add_empty_map(&mut self) -> &mut Self {
        self.buf.push(TAG_MAP);
        self.buf.push(TAG_MAP_END);
        self
    }

    /// Encodes `value` so that unsigned byte comparison matches numeric
    /// comparison: flip all bits for negatives, set the sign bit for
    /// non-negatives, then store big-endian.
    pub fn add_double(&mut self, value: f64) -> &mut Self {
        self.buf.push(TAG_DOUBLE);
        let bits = value.to_bits();
        let transformed = if value.is_sign_negative() { !bits } else { bits | (1u64 << 63) };
        self.buf.extend_from_slice(&transformed.to_be_bytes());
        self
    }

    /// Encodes a string as its raw UTF-8 bytes, NUL-terminated so a prefix
    /// of a longer string always sorts first (requires the string itself
    /// contain no NUL byte, true of document ids).
    pub fn add_string(&mut self, value: &str) -> &mut Self {
        self.buf.push(TAG_STRING);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(STRING_TERMINATOR);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Parses a byte sequence produced by [`CollatableBuilder`].
pub struct CollatableReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> CollatableReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn expect(&mut self, tag: u8, what: &str) -> CResult<()> {
        if self.pos >= self.buf.len() || self.buf[self.pos] != tag {
            return Err(Error::Corrupt(format!("expected {} tag while decoding expiry key", what)));
        }
        self.pos += 1;
        Ok(())
    }

    pub fn skip_array_tag(&mut self) -> CResult<()> {
        self.expect(TAG_ARRAY, "array")
    }

    pub fn read_double(&mut self) -> CResult<f64> {
        self.expect(TAG_DOUBLE, "double")?;
        if self.pos + 8 > self.buf.len() {
            return Err(Error::Corrupt("truncated double in expiry key".into()));
        }
        let mut bits_bytes = [0u8; 8];
        bits_bytes.copy_from_slice(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        let transformed = u64::from_be_bytes(bits_bytes);
        let bits = if transformed & (1u64 << 63) != 0 { transformed & !(1u64 << 63) } else { !transformed };
        Ok(f64::from_bits(bits))
    }

    pub fn skip_empty_map(&mut self) -> CResult<()> {
        self.expect(TAG_MAP, "map")?;
        self.expect(TAG_MAP_END, "end-of-map")
    }

    pub fn read_string(&mut self) -> CResult<String> {
        self.expect(TAG_STRING, "string")?;
        let start = self.pos;
        let end = self.buf[start..]
            .iter()
            .position(|&b| b == STRING_TERMINATOR)
            .ok_or_else(|| Error::Corrupt("unterminated string in expiry key".into()))?;
        let s = String::from_utf8(self.buf[start..start + end].to_vec())
            .map_err(|e| Error::Corrupt(e.to_string()))?;
        self.pos = start + end + 1;
        Ok(s)
    }
}

/// Encodes the `[timestamp, {}, docID]` tuple used by the expiry index.
pub fn encode_expiry_key(timestamp: f64, doc_id: &str) -> Vec<u8> {
    let mut b = CollatableBuilder::new();
    b.begin_array().add_double(timestamp).add_empty_map().add_string(doc_id).end_array();
    b.into_bytes()
}

/// Decodes the timestamp/docID pair out of an expiry key's raw bytes.
pub fn decode_expiry_key(bytes: &[u8]) -> CResult<(f64, String)> {
    let mut r = CollatableReader::new(bytes);
    r.skip_array_tag()?;
    let ts = r.read_double()?;
    r.skip_empty_map()?;
    let doc_id = r.read_string()?;
    Ok((ts, doc_id))
}
