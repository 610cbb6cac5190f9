//! DER (Distinguished Encoding Rules) decoder for entitlements
//!
//! Signatures made for iOS 15+ carry entitlements a second time in slot -7 as
//! DER. This module turns that encoding back into a plist dictionary.
//!
//! Apple wraps the dictionary as `[APPLICATION 16] { INTEGER 1, [CONTEXT 16] {...} }`;
//! some signers emit the bare dictionary as a SET instead. Both are accepted.
//!
//! The encoding uses the following ASN.1 DER tags:
//! - 0x01: BOOLEAN
//! - 0x02: INTEGER
//! - 0x0c: UTF8String
//! - 0x30: SEQUENCE (arrays, and each key-value pair)
//! - 0x31 / 0xb0: SET / [CONTEXT 16] (dictionaries)
//! - 0x70: [APPLICATION 16] (outer wrapper)

use crate::{Error, Result};
use plist::{Dictionary, Value};

/// DER tag for BOOLEAN
const DER_TAG_BOOLEAN: u8 = 0x01;

/// DER tag for INTEGER
const DER_TAG_INTEGER: u8 = 0x02;

/// DER tag for UTF8String
const DER_TAG_UTF8STRING: u8 = 0x0c;

/// DER tag for SEQUENCE (used for arrays)
const DER_TAG_SEQUENCE: u8 = 0x30;

/// DER tag for SET (used for dictionaries)
const DER_TAG_SET: u8 = 0x31;

/// Constructed [CONTEXT 16], Apple's dictionary tag
const DER_TAG_CONTEXT_DICT: u8 = 0xb0;

/// Constructed [APPLICATION 16], Apple's outer wrapper
const DER_TAG_APPLICATION_WRAPPER: u8 = 0x70;

/// Nesting limit for arrays and dictionaries.
const MAX_DEPTH: usize = 32;

fn malformed(msg: impl Into<String>) -> Error {
    Error::Entitlements(msg.into())
}

/// Cursor over a run of DER TLVs.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of DER data"))?;
        self.pos += 1;
        Ok(b)
    }

    /// Decode a short or long form length.
    fn length(&mut self) -> Result<usize> {
        let first = self.byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }

        let count = (first & 0x7f) as usize;
        if count == 0 || count > 4 {
            return Err(malformed(format!("unsupported DER length form 0x{:02x}", first)));
        }

        let mut length = 0usize;
        for _ in 0..count {
            length = (length << 8) | self.byte()? as usize;
        }
        Ok(length)
    }

    /// Read one TLV, returning its tag and contents.
    fn tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.byte()?;
        if tag & 0x1f == 0x1f {
            return Err(malformed("multi-byte DER tags are not used in entitlements"));
        }
        let length = self.length()?;
        let end = self
            .pos
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| malformed(format!("DER value of {} bytes is truncated", length)))?;

        let contents = &self.data[self.pos..end];
        self.pos = end;
        Ok((tag, contents))
    }
}

/// Decode a two's complement INTEGER of at most 8 bytes.
fn decode_integer(contents: &[u8]) -> Result<i64> {
    if contents.is_empty() || contents.len() > 8 {
        return Err(malformed(format!("INTEGER of {} bytes", contents.len())));
    }

    let negative = contents[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for &b in contents {
        value = (value << 8) | b as i64;
    }
    Ok(value)
}

fn decode_value(tag: u8, contents: &[u8], depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(malformed("entitlements nested too deeply"));
    }

    match tag {
        DER_TAG_BOOLEAN => match contents {
            [b] => Ok(Value::Boolean(*b != 0)),
            _ => Err(malformed("BOOLEAN must be one byte")),
        },
        DER_TAG_INTEGER => Ok(Value::Integer(decode_integer(contents)?.into())),
        DER_TAG_UTF8STRING => std::str::from_utf8(contents)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| malformed(format!("invalid UTF8String: {}", e))),
        DER_TAG_SEQUENCE => {
            let mut reader = Reader::new(contents);
            let mut items = Vec::new();
            while !reader.is_empty() {
                let (tag, contents) = reader.tlv()?;
                items.push(decode_value(tag, contents, depth + 1)?);
            }
            Ok(Value::Array(items))
        }
        DER_TAG_SET | DER_TAG_CONTEXT_DICT => {
            decode_dictionary(contents, depth).map(Value::Dictionary)
        }
        other => Err(malformed(format!("unsupported DER tag 0x{:02x}", other))),
    }
}

/// Decode the contents of a dictionary: a run of `SEQUENCE { key, value }`.
fn decode_dictionary(contents: &[u8], depth: usize) -> Result<Dictionary> {
    let mut reader = Reader::new(contents);
    let mut dict = Dictionary::new();

    while !reader.is_empty() {
        let (tag, pair) = reader.tlv()?;
        if tag != DER_TAG_SEQUENCE {
            return Err(malformed(format!(
                "dictionary entry tagged 0x{:02x}, expected SEQUENCE",
                tag
            )));
        }

        let mut pair_reader = Reader::new(pair);
        let (key_tag, key) = pair_reader.tlv()?;
        if key_tag != DER_TAG_UTF8STRING {
            return Err(malformed("dictionary key is not a UTF8String"));
        }
        let key = std::str::from_utf8(key)
            .map_err(|e| malformed(format!("invalid dictionary key: {}", e)))?;

        let (value_tag, value) = pair_reader.tlv()?;
        if !pair_reader.is_empty() {
            return Err(malformed(format!("trailing data in entry '{}'", key)));
        }
        dict.insert(key.to_string(), decode_value(value_tag, value, depth + 1)?);
    }

    Ok(dict)
}

/// Decode DER entitlements into a plist dictionary.
///
/// # Arguments
///
/// * `der` - The payload of a `CSMAGIC_EMBEDDED_DER_ENTITLEMENTS` blob
///
/// # Errors
///
/// Returns [`Error::Entitlements`] if the data is truncated, uses a tag
/// outside the entitlements subset, or the top level is not a dictionary.
pub fn der_to_dictionary(der: &[u8]) -> Result<Dictionary> {
    let mut reader = Reader::new(der);
    let (tag, contents) = reader.tlv()?;
    if !reader.is_empty() {
        return Err(malformed("trailing data after entitlements"));
    }

    let (tag, contents) = if tag == DER_TAG_APPLICATION_WRAPPER {
        let mut inner = Reader::new(contents);
        let (version_tag, version) = inner.tlv()?;
        if version_tag != DER_TAG_INTEGER || decode_integer(version)? != 1 {
            return Err(malformed("unsupported entitlements wrapper version"));
        }
        let dict = inner.tlv()?;
        if !inner.is_empty() {
            return Err(malformed("trailing data inside entitlements wrapper"));
        }
        dict
    } else {
        (tag, contents)
    };

    match tag {
        DER_TAG_SET | DER_TAG_CONTEXT_DICT => decode_dictionary(contents, 0),
        other => Err(malformed(format!(
            "entitlements top level tagged 0x{:02x}, expected a dictionary",
            other
        ))),
    }
}
