//! SuperBlob index parsing for Apple code signatures
//!
//! The SuperBlob is the top-level container for all code signature components.
//! It contains a header followed by an index of blob entries, each pointing
//! to an embedded blob (CodeDirectory, requirements, entitlements, CMS signature, etc.)
//!
//! ## Structure
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ SuperBlob Header (12 bytes)        │
//! │  - magic: 0xfade0cc0 (4 bytes)     │
//! │  - length: total size (4 bytes)    │
//! │  - count: number of blobs (4 bytes)│
//! ├────────────────────────────────────┤
//! │ Index Entry 0..count (8 bytes each)│
//! │  - slot_type (4 bytes)             │
//! │  - offset (4 bytes)                │
//! ├────────────────────────────────────┤
//! │ Blob data, each with its own       │
//! │ magic (4) + length (4) header      │
//! └────────────────────────────────────┘
//! ```
//!
//! The `LC_CODE_SIGNATURE` range is usually padded past the SuperBlob's own
//! length; everything after `length` is ignored.

use super::constants::*;
use crate::{Error, Result};

/// Size of the SuperBlob header in bytes (magic + length + count)
const SUPERBLOB_HEADER_SIZE: usize = 12;

/// Size of each index entry in bytes (slot_type + offset)
const INDEX_ENTRY_SIZE: usize = 8;

/// Read a big-endian u32 at `offset`, or `None` if out of range.
pub(crate) fn read_be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read a big-endian u64 at `offset`, or `None` if out of range.
pub(crate) fn read_be_u64(data: &[u8], offset: usize) -> Option<u64> {
    let bytes = data.get(offset..offset.checked_add(8)?)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Some(u64::from_be_bytes(buf))
}

/// A blob referenced from the SuperBlob index.
#[derive(Debug, Clone, Copy)]
pub struct BlobEntry<'a> {
    /// The slot type identifying this blob's purpose.
    /// See `CSSLOT_*` constants for standard slot types.
    pub slot_type: u32,
    /// The blob's own magic number.
    pub magic: u32,
    /// The raw blob, including its magic and length header.
    pub data: &'a [u8],
}

impl<'a> BlobEntry<'a> {
    /// The blob contents after the 8-byte magic + length header.
    pub fn payload(&self) -> &'a [u8] {
        &self.data[BLOB_HEADER_SIZE..]
    }
}

/// A parsed embedded-signature SuperBlob borrowing the signature bytes.
#[derive(Debug, Clone)]
pub struct SuperBlob<'a> {
    entries: Vec<BlobEntry<'a>>,
}

impl<'a> SuperBlob<'a> {
    /// Parse a SuperBlob from the bytes addressed by `LC_CODE_SIGNATURE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signature`] if the magic is wrong, the declared length
    /// exceeds the available data, or any index entry points outside the
    /// SuperBlob.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let magic = read_be_u32(data, 0)
            .ok_or_else(|| Error::Signature("signature shorter than SuperBlob header".into()))?;
        if magic != CSMAGIC_EMBEDDED_SIGNATURE {
            return Err(Error::Signature(format!(
                "unexpected SuperBlob magic 0x{:08x}",
                magic
            )));
        }

        let length = read_be_u32(data, 4).unwrap_or(0) as usize;
        let count = read_be_u32(data, 8).unwrap_or(0) as usize;

        if length < SUPERBLOB_HEADER_SIZE || length > data.len() {
            return Err(Error::Signature(format!(
                "SuperBlob length {} outside available {} bytes",
                length,
                data.len()
            )));
        }
        let data = &data[..length];

        let index_end = count
            .checked_mul(INDEX_ENTRY_SIZE)
            .and_then(|n| n.checked_add(SUPERBLOB_HEADER_SIZE))
            .filter(|&end| end <= length)
            .ok_or_else(|| {
                Error::Signature(format!("SuperBlob index of {} entries truncated", count))
            })?;

        let mut entries = Vec::with_capacity(count);
        for idx_offset in (SUPERBLOB_HEADER_SIZE..index_end).step_by(INDEX_ENTRY_SIZE) {
            // Both reads are inside the index bounds checked above
            let slot_type = read_be_u32(data, idx_offset).unwrap_or_default();
            let offset = read_be_u32(data, idx_offset + 4).unwrap_or_default() as usize;
            entries.push(Self::parse_entry(data, slot_type, offset)?);
        }

        Ok(Self { entries })
    }

    fn parse_entry(data: &'a [u8], slot_type: u32, offset: usize) -> Result<BlobEntry<'a>> {
        let (magic, blob_len) = read_be_u32(data, offset)
            .zip(read_be_u32(data, offset + 4))
            .ok_or_else(|| {
                Error::Signature(format!("slot 0x{:x} header outside SuperBlob", slot_type))
            })?;

        let blob_len = blob_len as usize;
        let end = offset
            .checked_add(blob_len)
            .filter(|&end| blob_len >= BLOB_HEADER_SIZE && end <= data.len())
            .ok_or_else(|| {
                Error::Signature(format!(
                    "slot 0x{:x} blob of {} bytes at offset {} exceeds SuperBlob",
                    slot_type, blob_len, offset
                ))
            })?;

        Ok(BlobEntry {
            slot_type,
            magic,
            data: &data[offset..end],
        })
    }

    /// All index entries in index order.
    pub fn entries(&self) -> &[BlobEntry<'a>] {
        &self.entries
    }

    /// The first blob stored in `slot_type`, if any.
    pub fn find(&self, slot_type: u32) -> Option<&BlobEntry<'a>> {
        self.entries.iter().find(|e| e.slot_type == slot_type)
    }

    /// CodeDirectory blobs (primary and alternates) in index order.
    pub fn code_directories(&self) -> impl Iterator<Item = &BlobEntry<'a>> {
        self.entries
            .iter()
            .filter(|e| is_code_directory_slot(e.slot_type))
    }
}
