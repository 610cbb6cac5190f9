//! Embedded signature reader
//!
//! Splits a SuperBlob into the components an inspection reports on:
//! every CodeDirectory, the requirements, both entitlements encodings and
//! the CMS signature.

use super::code_directory::{best_code_directory, CodeDirectory, CodeSignatureFlags};
use super::constants::*;
use super::der::der_to_dictionary;
use super::superblob::{read_be_u32, BlobEntry, SuperBlob};
use crate::{Error, Result};
use plist::{Dictionary, Value};

/// Components of an embedded code signature, borrowing the signature bytes.
#[derive(Debug, Clone)]
pub struct EmbeddedSignature<'a> {
    code_directories: Vec<CodeDirectory<'a>>,
    requirements: Option<&'a [u8]>,
    entitlements: Option<&'a [u8]>,
    der_entitlements: Option<&'a [u8]>,
    cms: Option<&'a [u8]>,
}

fn expect_magic(entry: &BlobEntry<'_>, magic: u32) -> Result<()> {
    if entry.magic == magic {
        Ok(())
    } else {
        Err(Error::Signature(format!(
            "slot 0x{:x} holds magic 0x{:08x}, expected 0x{:08x}",
            entry.slot_type, entry.magic, magic
        )))
    }
}

impl<'a> EmbeddedSignature<'a> {
    /// Parse the bytes addressed by `LC_CODE_SIGNATURE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signature`] if the SuperBlob is malformed, a known slot
    /// holds a blob of the wrong kind, or no CodeDirectory is present.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let superblob = SuperBlob::parse(data)?;

        let mut signature = Self {
            code_directories: Vec::new(),
            requirements: None,
            entitlements: None,
            der_entitlements: None,
            cms: None,
        };

        for entry in superblob.entries() {
            match entry.slot_type {
                slot if is_code_directory_slot(slot) => {
                    signature
                        .code_directories
                        .push(CodeDirectory::parse(slot, entry.data)?);
                }
                CSSLOT_REQUIREMENTS => {
                    expect_magic(entry, CSMAGIC_REQUIREMENTS)?;
                    signature.requirements = Some(entry.data);
                }
                CSSLOT_ENTITLEMENTS => {
                    expect_magic(entry, CSMAGIC_EMBEDDED_ENTITLEMENTS)?;
                    signature.entitlements = Some(entry.data);
                }
                CSSLOT_DER_ENTITLEMENTS => {
                    expect_magic(entry, CSMAGIC_EMBEDDED_DER_ENTITLEMENTS)?;
                    signature.der_entitlements = Some(entry.payload());
                }
                CSSLOT_SIGNATURESLOT => {
                    expect_magic(entry, CSMAGIC_BLOBWRAPPER)?;
                    signature.cms = Some(entry.payload());
                }
                other => {
                    tracing::trace!(slot = other, magic = entry.magic, "skipping signature slot");
                }
            }
        }

        if signature.code_directories.is_empty() {
            return Err(Error::Signature("signature has no CodeDirectory".into()));
        }

        Ok(signature)
    }

    /// All CodeDirectories in SuperBlob index order.
    pub fn code_directories(&self) -> &[CodeDirectory<'a>] {
        &self.code_directories
    }

    /// The CodeDirectory that identifies the code (strongest hash type).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Signature`] if no CodeDirectory uses a known hash type.
    pub fn primary_code_directory(&self) -> Result<&CodeDirectory<'a>> {
        best_code_directory(&self.code_directories)
            .ok_or_else(|| Error::Signature("no CodeDirectory with a supported hash type".into()))
    }

    /// Raw internal requirements blob, if it holds at least one requirement.
    pub fn requirements(&self) -> Option<&'a [u8]> {
        self.requirements
            .filter(|blob| read_be_u32(blob, BLOB_HEADER_SIZE).unwrap_or(0) > 0)
    }

    /// Raw XML entitlements blob including its magic and length header.
    pub fn entitlements_blob(&self) -> Option<&'a [u8]> {
        self.entitlements
    }

    /// Entitlements as a dictionary, preferring the XML form over DER.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Plist`] or [`Error::Entitlements`] if the stored
    /// entitlements cannot be decoded, or [`Error::Entitlements`] when the
    /// XML plist is not a dictionary.
    pub fn entitlements(&self) -> Result<Option<Dictionary>> {
        if let Some(blob) = self.entitlements {
            let value: Value = plist::from_bytes(&blob[BLOB_HEADER_SIZE..])?;
            return match value {
                Value::Dictionary(dict) => Ok(Some(dict)),
                _ => Err(Error::Entitlements("entitlements plist is not a dictionary".into())),
            };
        }

        self.der_entitlements.map(der_to_dictionary).transpose()
    }

    /// CMS SignedData bytes, or `None` for an ad-hoc signature.
    pub fn cms(&self) -> Option<&'a [u8]> {
        self.cms.filter(|payload| !payload.is_empty())
    }

    /// True when the code carries no signing identity.
    pub fn is_adhoc(&self) -> bool {
        self.cms().is_none()
            || self
                .code_directories
                .iter()
                .any(|cd| cd.flags().contains(CodeSignatureFlags::ADHOC))
    }
}
