//! Apple code signing constants and magic numbers
//!
//! These constants define the binary format of embedded code signatures:
//! blob magics, SuperBlob slot numbers, CodeDirectory versions and hash types.
//! All multi-byte values in a signature are stored big-endian.

// =============================================================================
// Blob Magic Numbers
// =============================================================================

/// SuperBlob containing all signature components (embedded signature)
pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade0cc0;

/// CodeDirectory blob magic
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xfade0c02;

/// Requirements blob magic
pub const CSMAGIC_REQUIREMENTS: u32 = 0xfade0c01;

/// Embedded entitlements (XML plist format)
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xfade7171;

/// Embedded DER entitlements (ASN.1 DER format)
pub const CSMAGIC_EMBEDDED_DER_ENTITLEMENTS: u32 = 0xfade7172;

/// CMS signature wrapper blob
pub const CSMAGIC_BLOBWRAPPER: u32 = 0xfade0b01;

/// Size of the generic blob header (magic + length)
pub const BLOB_HEADER_SIZE: usize = 8;

// =============================================================================
// Slot Types (for SuperBlob index)
// =============================================================================

/// Primary code directory slot
pub const CSSLOT_CODEDIRECTORY: u32 = 0x0000;

/// Code requirements slot
pub const CSSLOT_REQUIREMENTS: u32 = 0x0002;

/// Entitlements slot (XML format)
pub const CSSLOT_ENTITLEMENTS: u32 = 0x0005;

/// DER entitlements slot
pub const CSSLOT_DER_ENTITLEMENTS: u32 = 0x0007;

/// Alternate code directories start (SHA-256, SHA-384, etc.)
pub const CSSLOT_ALTERNATE_CODEDIRECTORIES: u32 = 0x1000;

/// Maximum number of alternate code directories
pub const CSSLOT_ALTERNATE_CODEDIRECTORY_MAX: u32 = 5;

/// Limit for alternate code directory slots
pub const CSSLOT_ALTERNATE_CODEDIRECTORY_LIMIT: u32 =
    CSSLOT_ALTERNATE_CODEDIRECTORIES + CSSLOT_ALTERNATE_CODEDIRECTORY_MAX;

/// CMS signature slot
pub const CSSLOT_SIGNATURESLOT: u32 = 0x10000;

/// Returns true for the primary or any alternate CodeDirectory slot.
pub fn is_code_directory_slot(slot: u32) -> bool {
    slot == CSSLOT_CODEDIRECTORY
        || (CSSLOT_ALTERNATE_CODEDIRECTORIES..CSSLOT_ALTERNATE_CODEDIRECTORY_LIMIT).contains(&slot)
}

// =============================================================================
// Hash Types
// =============================================================================

/// SHA-1 hash (160-bit / 20 bytes)
pub const CS_HASHTYPE_SHA1: u8 = 1;

/// SHA-256 hash (256-bit / 32 bytes)
pub const CS_HASHTYPE_SHA256: u8 = 2;

/// SHA-256 truncated to 20 bytes (legacy compatibility)
pub const CS_HASHTYPE_SHA256_TRUNCATED: u8 = 3;

/// SHA-384 hash (384-bit / 48 bytes)
pub const CS_HASHTYPE_SHA384: u8 = 4;

/// Length of a CDHash; every digest is truncated to this many bytes.
pub const CS_CDHASH_LEN: usize = 20;

// =============================================================================
// Code Signature Flags (CodeDirectory `flags` field)
// =============================================================================

/// Ad-hoc signed (no identity)
pub const CS_ADHOC: u32 = 0x0000_0002;

/// Force hard page validation
pub const CS_HARD: u32 = 0x0000_0100;

/// Force kill on page validation failure
pub const CS_KILL: u32 = 0x0000_0200;

/// Honour certificate expiration
pub const CS_CHECK_EXPIRATION: u32 = 0x0000_0400;

/// Restrict dyld loading
pub const CS_RESTRICT: u32 = 0x0000_0800;

/// Require enforcement
pub const CS_ENFORCEMENT: u32 = 0x0000_1000;

/// Require library validation
pub const CS_REQUIRE_LV: u32 = 0x0000_2000;

/// Hardened runtime
pub const CS_RUNTIME: u32 = 0x0001_0000;

/// Signature produced by the linker
pub const CS_LINKER_SIGNED: u32 = 0x0002_0000;

// =============================================================================
// CodeDirectory Versions
// =============================================================================

/// Earliest supported CodeDirectory version
pub const CODEDIRECTORY_VERSION_EARLIEST: u32 = 0x20001;

/// Version with scatter support
pub const CODEDIRECTORY_VERSION_SCATTER: u32 = 0x20100;

/// Version with team ID support
pub const CODEDIRECTORY_VERSION_TEAMID: u32 = 0x20200;

/// Version with 64-bit code limit
pub const CODEDIRECTORY_VERSION_CODELIMIT64: u32 = 0x20300;

/// Version with exec segment fields
pub const CODEDIRECTORY_VERSION_EXECSEG: u32 = 0x20400;

/// Version with runtime version and pre-encrypt hashes
pub const CODEDIRECTORY_VERSION_RUNTIME: u32 = 0x20500;

/// Latest version this reader knows field offsets for
pub const CODEDIRECTORY_VERSION_LINKAGE: u32 = 0x20600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_numbers() {
        assert_eq!(CSMAGIC_EMBEDDED_SIGNATURE, 0xfade0cc0);
        assert_eq!(CSMAGIC_CODEDIRECTORY, 0xfade0c02);
        assert_eq!(CSMAGIC_REQUIREMENTS, 0xfade0c01);
        assert_eq!(CSMAGIC_EMBEDDED_ENTITLEMENTS, 0xfade7171);
        assert_eq!(CSMAGIC_EMBEDDED_DER_ENTITLEMENTS, 0xfade7172);
        assert_eq!(CSMAGIC_BLOBWRAPPER, 0xfade0b01);
    }

    #[test]
    fn test_code_directory_slots() {
        assert!(is_code_directory_slot(CSSLOT_CODEDIRECTORY));
        assert!(is_code_directory_slot(CSSLOT_ALTERNATE_CODEDIRECTORIES));
        assert!(is_code_directory_slot(0x1004));
        assert!(!is_code_directory_slot(0x1005));
        assert!(!is_code_directory_slot(CSSLOT_REQUIREMENTS));
        assert!(!is_code_directory_slot(CSSLOT_SIGNATURESLOT));
    }

    #[test]
    fn test_codedirectory_versions_ordered() {
        assert!(CODEDIRECTORY_VERSION_EARLIEST < CODEDIRECTORY_VERSION_SCATTER);
        assert!(CODEDIRECTORY_VERSION_SCATTER < CODEDIRECTORY_VERSION_TEAMID);
        assert!(CODEDIRECTORY_VERSION_TEAMID < CODEDIRECTORY_VERSION_CODELIMIT64);
        assert!(CODEDIRECTORY_VERSION_CODELIMIT64 < CODEDIRECTORY_VERSION_EXECSEG);
        assert!(CODEDIRECTORY_VERSION_EXECSEG < CODEDIRECTORY_VERSION_RUNTIME);
    }
}
