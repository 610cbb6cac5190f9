//! Signing information produced by an inspection
//!
//! [`SigningInfo`] is the typed form of the attribute mapping Apple's
//! `SecCodeCopySigningInformation` returns. [`SigningInfo::to_dictionary`]
//! yields the same data as a plist dictionary keyed by Apple's attribute
//! names.

use crate::codesign::{CodeSignatureFlags, HashType};
use crate::crypto::Certificate;
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};

/// Attribute names used by [`SigningInfo::to_dictionary`].
pub mod keys {
    pub const IDENTIFIER: &str = "identifier";
    pub const FORMAT: &str = "format";
    pub const SOURCE: &str = "source";
    pub const MAIN_EXECUTABLE: &str = "main-executable";
    pub const FLAGS: &str = "flags";
    pub const DIGEST_ALGORITHM: &str = "digest-algorithm";
    pub const DIGEST_ALGORITHMS: &str = "digest-algorithms";
    pub const UNIQUE: &str = "unique";
    pub const CDHASHES: &str = "cdhashes";
    pub const TEAM_ID: &str = "teamid";
    pub const PLATFORM_IDENTIFIER: &str = "platform-identifier";
    pub const RUNTIME_VERSION: &str = "runtime-version";
    pub const INFO_PLIST: &str = "info-plist";
    pub const CERTIFICATES: &str = "certificates";
    pub const ENTITLEMENTS: &str = "entitlements";
    pub const ENTITLEMENTS_DICT: &str = "entitlements-dict";
    pub const REQUIREMENT_DATA: &str = "requirement-data";
}

/// Where the signature was read from
const SOURCE_EMBEDDED: &str = "embedded";

/// Code signing metadata for one executable.
///
/// Produced fresh by every inspection and owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningInfo {
    pub(crate) identifier: String,
    pub(crate) format: String,
    pub(crate) main_executable: PathBuf,
    pub(crate) flags: u32,
    pub(crate) digest_algorithm: HashType,
    pub(crate) digest_algorithms: Vec<u8>,
    pub(crate) unique: [u8; 20],
    pub(crate) cdhashes: Vec<[u8; 20]>,
    pub(crate) team_id: Option<String>,
    pub(crate) platform_identifier: Option<u8>,
    pub(crate) runtime_version: Option<u32>,
    pub(crate) adhoc: bool,
    pub(crate) info_plist: Option<Dictionary>,
    pub(crate) certificates: Vec<Certificate>,
    pub(crate) entitlements: Option<Vec<u8>>,
    pub(crate) entitlements_dict: Option<Dictionary>,
    pub(crate) requirement_data: Option<Vec<u8>>,
}

impl SigningInfo {
    /// Signing identifier from the CodeDirectory.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Container description, e.g. `Mach-O thin (arm64)`.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Path of the file the signature was read from.
    pub fn main_executable(&self) -> &Path {
        &self.main_executable
    }

    /// CodeDirectory flags.
    pub fn flags(&self) -> CodeSignatureFlags {
        CodeSignatureFlags::from_bits_retain(self.flags)
    }

    /// Hash type of the CodeDirectory that identifies the code.
    pub fn digest_algorithm(&self) -> HashType {
        self.digest_algorithm
    }

    /// Raw hash type of every CodeDirectory with a known hash type, in slot
    /// order. Index `i` pairs with `cdhashes()[i]`.
    pub fn digest_algorithms(&self) -> &[u8] {
        &self.digest_algorithms
    }

    /// CDHash of the identifying CodeDirectory.
    pub fn cdhash(&self) -> &[u8; 20] {
        &self.unique
    }

    /// CDHash of every CodeDirectory with a known hash type, in slot order.
    pub fn cdhashes(&self) -> &[[u8; 20]] {
        &self.cdhashes
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    pub fn platform_identifier(&self) -> Option<u8> {
        self.platform_identifier
    }

    /// SDK version the hardened runtime targets, packed as `xxxx.yy.zz`.
    pub fn runtime_version(&self) -> Option<u32> {
        self.runtime_version
    }

    /// True for ad-hoc signatures (no signing identity).
    pub fn is_adhoc(&self) -> bool {
        self.adhoc
    }

    /// The bundle's Info.plist, for bundle locations.
    pub fn info_plist(&self) -> Option<&Dictionary> {
        self.info_plist.as_ref()
    }

    /// Signing certificates, leaf first. Empty for ad-hoc signatures or
    /// when certificates were not requested.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Raw XML entitlements blob.
    pub fn entitlements(&self) -> Option<&[u8]> {
        self.entitlements.as_deref()
    }

    /// Decoded entitlements.
    pub fn entitlements_dict(&self) -> Option<&Dictionary> {
        self.entitlements_dict.as_ref()
    }

    /// Raw internal requirements blob.
    pub fn requirement_data(&self) -> Option<&[u8]> {
        self.requirement_data.as_deref()
    }

    /// Convert to a plist dictionary keyed by Apple attribute names.
    ///
    /// Optional attributes are left out rather than stored empty.
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();

        dict.insert(keys::IDENTIFIER.into(), Value::String(self.identifier.clone()));
        dict.insert(keys::FORMAT.into(), Value::String(self.format.clone()));
        dict.insert(keys::SOURCE.into(), Value::String(SOURCE_EMBEDDED.into()));
        dict.insert(
            keys::MAIN_EXECUTABLE.into(),
            Value::String(self.main_executable.display().to_string()),
        );
        dict.insert(keys::FLAGS.into(), integer(self.flags.into()));
        dict.insert(
            keys::DIGEST_ALGORITHM.into(),
            integer(self.digest_algorithm.raw().into()),
        );
        dict.insert(
            keys::DIGEST_ALGORITHMS.into(),
            Value::Array(
                self.digest_algorithms
                    .iter()
                    .map(|&raw| integer(raw.into()))
                    .collect(),
            ),
        );
        dict.insert(keys::UNIQUE.into(), Value::Data(self.unique.to_vec()));
        dict.insert(
            keys::CDHASHES.into(),
            Value::Array(
                self.cdhashes
                    .iter()
                    .map(|cdhash| Value::Data(cdhash.to_vec()))
                    .collect(),
            ),
        );

        if let Some(team_id) = &self.team_id {
            dict.insert(keys::TEAM_ID.into(), Value::String(team_id.clone()));
        }
        if let Some(platform) = self.platform_identifier {
            dict.insert(keys::PLATFORM_IDENTIFIER.into(), integer(platform.into()));
        }
        if let Some(runtime) = self.runtime_version {
            dict.insert(keys::RUNTIME_VERSION.into(), integer(runtime.into()));
        }
        if let Some(info_plist) = &self.info_plist {
            dict.insert(keys::INFO_PLIST.into(), Value::Dictionary(info_plist.clone()));
        }
        if !self.certificates.is_empty() {
            dict.insert(
                keys::CERTIFICATES.into(),
                Value::Array(
                    self.certificates
                        .iter()
                        .map(|cert| Value::Data(cert.der().to_vec()))
                        .collect(),
                ),
            );
        }
        if let Some(entitlements) = &self.entitlements {
            dict.insert(keys::ENTITLEMENTS.into(), Value::Data(entitlements.clone()));
        }
        if let Some(entitlements) = &self.entitlements_dict {
            dict.insert(
                keys::ENTITLEMENTS_DICT.into(),
                Value::Dictionary(entitlements.clone()),
            );
        }
        if let Some(requirements) = &self.requirement_data {
            dict.insert(keys::REQUIREMENT_DATA.into(), Value::Data(requirements.clone()));
        }

        dict
    }
}

fn integer(value: u64) -> Value {
    Value::Integer(value.into())
}

/// Format a packed `xxxx.yy.zz` version number.
pub fn format_version(packed: u32) -> String {
    format!(
        "{}.{}.{}",
        packed >> 16,
        (packed >> 8) & 0xff,
        packed & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SigningInfo {
        SigningInfo {
            identifier: "com.example.app".into(),
            format: "Mach-O thin (arm64)".into(),
            main_executable: PathBuf::from("/tmp/Example"),
            flags: 0x10000,
            digest_algorithm: HashType::Sha256,
            digest_algorithms: vec![1, 2],
            unique: [0xab; 20],
            cdhashes: vec![[0xcd; 20], [0xab; 20]],
            team_id: None,
            platform_identifier: None,
            runtime_version: Some(0x000e_0000),
            adhoc: true,
            info_plist: None,
            certificates: Vec::new(),
            entitlements: None,
            entitlements_dict: None,
            requirement_data: None,
        }
    }

    #[test]
    fn test_required_keys() {
        let dict = sample().to_dictionary();

        assert_eq!(
            dict.get(keys::IDENTIFIER).and_then(Value::as_string),
            Some("com.example.app")
        );
        assert_eq!(dict.get(keys::SOURCE).and_then(Value::as_string), Some("embedded"));
        assert_eq!(
            dict.get(keys::FLAGS).and_then(Value::as_unsigned_integer),
            Some(0x10000)
        );
        assert_eq!(
            dict.get(keys::DIGEST_ALGORITHM).and_then(Value::as_unsigned_integer),
            Some(2)
        );
        assert_eq!(
            dict.get(keys::UNIQUE).and_then(Value::as_data),
            Some(&[0xab; 20][..])
        );
        assert_eq!(
            dict.get(keys::CDHASHES).and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn test_absent_optional_keys_are_omitted() {
        let dict = sample().to_dictionary();

        for key in [
            keys::TEAM_ID,
            keys::PLATFORM_IDENTIFIER,
            keys::INFO_PLIST,
            keys::CERTIFICATES,
            keys::ENTITLEMENTS,
            keys::ENTITLEMENTS_DICT,
            keys::REQUIREMENT_DATA,
        ] {
            assert!(!dict.contains_key(key), "{} should be absent", key);
        }
        assert!(dict.contains_key(keys::RUNTIME_VERSION));
    }

    #[test]
    fn test_optional_keys_present() {
        let mut info = sample();
        info.team_id = Some("TEAMID1234".into());
        info.platform_identifier = Some(7);
        info.requirement_data = Some(vec![0xfa, 0xde, 0x0c, 0x01]);

        let dict = info.to_dictionary();
        assert_eq!(dict.get(keys::TEAM_ID).and_then(Value::as_string), Some("TEAMID1234"));
        assert_eq!(
            dict.get(keys::PLATFORM_IDENTIFIER).and_then(Value::as_unsigned_integer),
            Some(7)
        );
        assert!(dict.get(keys::REQUIREMENT_DATA).and_then(Value::as_data).is_some());
    }

    #[test]
    fn test_typed_accessors() {
        let info = sample();
        assert!(info.flags().contains(CodeSignatureFlags::RUNTIME));
        assert_eq!(info.digest_algorithm(), HashType::Sha256);
        assert_eq!(info.cdhash(), &[0xab; 20]);
        assert!(info.is_adhoc());
    }

    #[test]
    fn test_format_version() {
        assert_eq!(format_version(0x000e_0000), "14.0.0");
        assert_eq!(format_version(0x000d_0301), "13.3.1");
    }
}
