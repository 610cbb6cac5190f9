//! CodeDirectory blob parsing for Apple code signatures
//!
//! The CodeDirectory is the core data structure of an iOS/macOS code signature.
//! It names the signing identifier and team, carries the signature flags, and
//! holds the hashes of every code page and special slot. A signature may carry
//! several CodeDirectories that differ only in hash type (slot 0 plus the
//! alternate slots starting at 0x1000).
//!
//! ## Header layout (big-endian)
//!
//! | Offset | Field | Since |
//! |-------:|-------|-------|
//! | 0 | magic, length, version, flags | 0x20001 |
//! | 16 | hashOffset, identOffset, nSpecialSlots, nCodeSlots, codeLimit | 0x20001 |
//! | 36 | hashSize, hashType, platform, pageSize, spare2 | 0x20001 |
//! | 44 | scatterOffset | 0x20100 |
//! | 48 | teamOffset, spare3 | 0x20200 |
//! | 56 | codeLimit64 | 0x20300 |
//! | 64 | execSegBase, execSegLimit, execSegFlags | 0x20400 |
//! | 88 | runtime, preEncryptOffset | 0x20500 |

use super::constants::*;
use super::superblob::{read_be_u32, read_be_u64};
use crate::{Error, Result};
use bitflags::bitflags;
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384};

/// Size of the fixed header every CodeDirectory version carries.
const CODEDIRECTORY_MIN_HEADER_SIZE: usize = 44;

/// Digest algorithm of a CodeDirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashType {
    /// SHA-1 (20 bytes)
    Sha1,
    /// SHA-256 (32 bytes)
    Sha256,
    /// SHA-256 truncated to 20 bytes
    Sha256Truncated,
    /// SHA-384 (48 bytes)
    Sha384,
}

impl HashType {
    /// Map a raw `hashType` byte to a known algorithm.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            CS_HASHTYPE_SHA1 => Some(Self::Sha1),
            CS_HASHTYPE_SHA256 => Some(Self::Sha256),
            CS_HASHTYPE_SHA256_TRUNCATED => Some(Self::Sha256Truncated),
            CS_HASHTYPE_SHA384 => Some(Self::Sha384),
            _ => None,
        }
    }

    /// The raw `hashType` value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Sha1 => CS_HASHTYPE_SHA1,
            Self::Sha256 => CS_HASHTYPE_SHA256,
            Self::Sha256Truncated => CS_HASHTYPE_SHA256_TRUNCATED,
            Self::Sha384 => CS_HASHTYPE_SHA384,
        }
    }

    /// Name as printed by `codesign -d`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha256Truncated => "sha256-truncated",
            Self::Sha384 => "sha384",
        }
    }

    /// Preference order when choosing the CodeDirectory that identifies the code.
    fn strength(self) -> u8 {
        match self {
            Self::Sha1 => 0,
            Self::Sha256Truncated => 1,
            Self::Sha256 => 2,
            Self::Sha384 => 3,
        }
    }

    /// Digest `data` and truncate to CDHash length.
    pub fn cdhash(self, data: &[u8]) -> [u8; CS_CDHASH_LEN] {
        let mut out = [0u8; CS_CDHASH_LEN];
        match self {
            Self::Sha1 => out.copy_from_slice(&Sha1::digest(data)),
            Self::Sha256 | Self::Sha256Truncated => {
                out.copy_from_slice(&Sha256::digest(data)[..CS_CDHASH_LEN])
            }
            Self::Sha384 => out.copy_from_slice(&Sha384::digest(data)[..CS_CDHASH_LEN]),
        }
        out
    }
}

bitflags! {
    /// The CodeDirectory `flags` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CodeSignatureFlags: u32 {
        const ADHOC = CS_ADHOC;
        const HARD = CS_HARD;
        const KILL = CS_KILL;
        const CHECK_EXPIRATION = CS_CHECK_EXPIRATION;
        const RESTRICT = CS_RESTRICT;
        const ENFORCEMENT = CS_ENFORCEMENT;
        const REQUIRE_LV = CS_REQUIRE_LV;
        const RUNTIME = CS_RUNTIME;
        const LINKER_SIGNED = CS_LINKER_SIGNED;

        // Keep bits this reader has no name for
        const _ = !0;
    }
}

impl CodeSignatureFlags {
    /// Comma separated names in `codesign` style, e.g. `adhoc,runtime`.
    pub fn describe(self) -> String {
        const NAMES: &[(CodeSignatureFlags, &str)] = &[
            (CodeSignatureFlags::HARD, "hard"),
            (CodeSignatureFlags::KILL, "kill"),
            (CodeSignatureFlags::CHECK_EXPIRATION, "expires"),
            (CodeSignatureFlags::RESTRICT, "restrict"),
            (CodeSignatureFlags::ENFORCEMENT, "enforcement"),
            (CodeSignatureFlags::REQUIRE_LV, "library-validation"),
            (CodeSignatureFlags::RUNTIME, "runtime"),
            (CodeSignatureFlags::LINKER_SIGNED, "linker-signed"),
        ];

        let mut names = Vec::new();
        if self.contains(CodeSignatureFlags::ADHOC) {
            names.push("adhoc");
        }
        for (flag, name) in NAMES {
            if self.contains(*flag) {
                names.push(*name);
            }
        }
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(",")
        }
    }
}

/// Executable segment fields (version 0x20400 and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecSegment {
    /// File offset of the executable segment.
    pub base: u64,
    /// Size of the executable segment.
    pub limit: u64,
    /// `CS_EXECSEG_*` bits, such as main binary or allow unsigned pages.
    pub flags: u64,
}

/// A parsed CodeDirectory borrowing its blob bytes.
#[derive(Debug, Clone)]
pub struct CodeDirectory<'a> {
    raw: &'a [u8],
    slot_type: u32,
    version: u32,
    flags: u32,
    identifier: String,
    team_id: Option<String>,
    hash_type: u8,
    hash_size: u8,
    platform: u8,
    page_size_log2: u8,
    n_special_slots: u32,
    n_code_slots: u32,
    code_limit: u64,
    exec_segment: Option<ExecSegment>,
    runtime_version: Option<u32>,
}

impl<'a> CodeDirectory<'a> {
    /// Parse a CodeDirectory blob found in `slot_type`.
    ///
    /// `raw` must be exactly the blob as addressed by the SuperBlob index,
    /// including its magic and length header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signature`] when the magic or version is wrong, the
    /// header is truncated, or the identifier, team id or hash slots point
    /// outside the blob.
    pub fn parse(slot_type: u32, raw: &'a [u8]) -> Result<Self> {
        if raw.len() < CODEDIRECTORY_MIN_HEADER_SIZE {
            return Err(Error::Signature(format!(
                "CodeDirectory of {} bytes is shorter than its header",
                raw.len()
            )));
        }

        let field = |offset: usize| read_be_u32(raw, offset).unwrap_or_default();

        let magic = field(0);
        if magic != CSMAGIC_CODEDIRECTORY {
            return Err(Error::Signature(format!(
                "unexpected CodeDirectory magic 0x{:08x}",
                magic
            )));
        }

        let version = field(8);
        if version < CODEDIRECTORY_VERSION_EARLIEST {
            return Err(Error::Signature(format!(
                "unsupported CodeDirectory version 0x{:x}",
                version
            )));
        }
        if version > CODEDIRECTORY_VERSION_LINKAGE {
            tracing::trace!(version, "CodeDirectory newer than known layouts");
        }

        let flags = field(12);
        let hash_offset = field(16) as usize;
        let ident_offset = field(20) as usize;
        let n_special_slots = field(24);
        let n_code_slots = field(28);
        let mut code_limit = field(32) as u64;
        let hash_size = raw[36];
        let hash_type = raw[37];
        let platform = raw[38];
        let page_size_log2 = raw[39];

        let identifier = read_cstring(raw, ident_offset)
            .ok_or_else(|| Error::Signature("CodeDirectory identifier outside blob".into()))?;

        let has_field = |since: u32, end: usize| version >= since && raw.len() >= end;

        let team_id = if has_field(CODEDIRECTORY_VERSION_TEAMID, 52) {
            match field(48) as usize {
                0 => None,
                team_offset => Some(read_cstring(raw, team_offset).ok_or_else(|| {
                    Error::Signature("CodeDirectory team id outside blob".into())
                })?),
            }
        } else {
            None
        };

        if has_field(CODEDIRECTORY_VERSION_CODELIMIT64, 64) {
            let limit64 = read_be_u64(raw, 56).unwrap_or_default();
            if limit64 != 0 {
                code_limit = limit64;
            }
        }

        let exec_segment = if has_field(CODEDIRECTORY_VERSION_EXECSEG, 88) {
            Some(ExecSegment {
                base: read_be_u64(raw, 64).unwrap_or_default(),
                limit: read_be_u64(raw, 72).unwrap_or_default(),
                flags: read_be_u64(raw, 80).unwrap_or_default(),
            })
        } else {
            None
        };

        let runtime_version = if has_field(CODEDIRECTORY_VERSION_RUNTIME, 92) {
            Some(field(88)).filter(|&v| v != 0)
        } else {
            None
        };

        // Special slots sit just before hashOffset, code slots after it
        let special_len = n_special_slots as usize * hash_size as usize;
        let code_len = n_code_slots as usize * hash_size as usize;
        if hash_offset < special_len || hash_offset.saturating_add(code_len) > raw.len() {
            return Err(Error::Signature(format!(
                "CodeDirectory hash slots ({} special, {} code) outside blob",
                n_special_slots, n_code_slots
            )));
        }

        Ok(Self {
            raw,
            slot_type,
            version,
            flags,
            identifier,
            team_id,
            hash_type,
            hash_size,
            platform,
            page_size_log2,
            n_special_slots,
            n_code_slots,
            code_limit,
            exec_segment,
            runtime_version,
        })
    }

    /// SuperBlob slot this directory was found in.
    pub fn slot_type(&self) -> u32 {
        self.slot_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn flags(&self) -> CodeSignatureFlags {
        CodeSignatureFlags::from_bits_retain(self.flags)
    }

    /// Raw `flags` field.
    pub fn raw_flags(&self) -> u32 {
        self.flags
    }

    /// Signing identifier, usually the bundle identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Known digest algorithm, or `None` for an unsupported `hashType`.
    pub fn hash_type(&self) -> Option<HashType> {
        HashType::from_raw(self.hash_type)
    }

    /// Raw `hashType` byte.
    pub fn raw_hash_type(&self) -> u8 {
        self.hash_type
    }

    pub fn hash_size(&self) -> u8 {
        self.hash_size
    }

    /// Platform identifier; non-zero only for platform binaries.
    pub fn platform(&self) -> u8 {
        self.platform
    }

    /// Page size in bytes, or 0 for a single "infinite" page.
    pub fn page_size(&self) -> u64 {
        match self.page_size_log2 {
            0 => 0,
            log2 => 1u64.checked_shl(log2 as u32).unwrap_or(0),
        }
    }

    pub fn special_slot_count(&self) -> u32 {
        self.n_special_slots
    }

    pub fn code_slot_count(&self) -> u32 {
        self.n_code_slots
    }

    /// Number of bytes covered by the code slots.
    pub fn code_limit(&self) -> u64 {
        self.code_limit
    }

    pub fn exec_segment(&self) -> Option<ExecSegment> {
        self.exec_segment
    }

    /// Packed SDK version the hardened runtime was built against.
    pub fn runtime_version(&self) -> Option<u32> {
        self.runtime_version
    }

    /// CDHash of this directory, or `None` if its hash type is unsupported.
    pub fn cdhash(&self) -> Option<[u8; CS_CDHASH_LEN]> {
        self.hash_type().map(|ht| ht.cdhash(self.raw))
    }

    /// The raw blob bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }
}

/// Pick the CodeDirectory with the strongest supported hash type.
///
/// Ties keep the earliest directory, so a lone primary slot always wins.
pub fn best_code_directory<'a, 'b>(
    directories: &'b [CodeDirectory<'a>],
) -> Option<&'b CodeDirectory<'a>> {
    // max_by_key keeps the last maximum, so walk backwards
    directories
        .iter()
        .rev()
        .filter(|cd| cd.hash_type().is_some())
        .max_by_key(|cd| cd.hash_type().map(HashType::strength))
}

/// Read a NUL-terminated UTF-8 string starting at `offset`.
fn read_cstring(data: &[u8], offset: usize) -> Option<String> {
    let tail = data.get(offset..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}
