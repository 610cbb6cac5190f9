//! Signature inspection facade
//!
//! [`SignatureInspector`] answers two questions: what does the code signature
//! of this executable or bundle say, and how should this certificate be
//! described to a person. Both answers are either present or absent; the
//! `try_` variants keep the reason for an absent answer.
//!
//! # Examples
//!
//! ```no_run
//! use csinspect::{InspectFlags, SignatureInspector};
//!
//! let inspector = SignatureInspector::new()
//!     .architecture("arm64")
//!     .flags(InspectFlags::SIGNING_INFORMATION);
//!
//! if let Some(info) = inspector.code_signature("/Applications/Safari.app") {
//!     println!("{} ({})", info.identifier(), info.format());
//!     for cert in info.certificates() {
//!         println!("  {}", inspector.certificate_summary(cert).unwrap_or_default());
//!     }
//! }
//! ```

use crate::bundle::ResolvedLocation;
use crate::codesign::EmbeddedSignature;
use crate::crypto::{certificates_from_cms, Certificate, CertificateHandle};
use crate::info::SigningInfo;
use crate::macho::MachOFile;
use crate::{Error, Result};
use bitflags::bitflags;
use std::path::Path;

bitflags! {
    /// Optional attribute groups included in [`SigningInfo`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InspectFlags: u32 {
        /// Certificates from the CMS signature.
        const SIGNING_INFORMATION = 1 << 1;
        /// Entitlements and the internal requirements blob.
        const REQUIREMENT_INFORMATION = 1 << 2;
    }
}

impl Default for InspectFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// Reads code signatures and describes certificates.
///
/// Holds only immutable options, so one inspector can serve any number of
/// threads.
#[derive(Debug, Clone, Default)]
pub struct SignatureInspector {
    architecture: Option<String>,
    flags: InspectFlags,
}

impl SignatureInspector {
    /// Inspector with default options: host architecture, all attribute groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect this architecture of a universal binary (`arm64`, `x86_64`, ...).
    pub fn architecture(mut self, name: impl Into<String>) -> Self {
        self.architecture = Some(name.into());
        self
    }

    /// Select the optional attribute groups to include.
    pub fn flags(mut self, flags: InspectFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Signing information for a bundle or executable, or `None` when the
    /// location is unsigned, unreadable or malformed.
    pub fn code_signature(&self, location: impl AsRef<Path>) -> Option<SigningInfo> {
        let location = location.as_ref();
        match self.try_code_signature(location) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::debug!(location = %location.display(), error = %e, "no code signature");
                None
            }
        }
    }

    /// Short description of a certificate's subject, or `None` for a null or
    /// unparsable handle. Never an empty string.
    pub fn certificate_summary<C: CertificateHandle + ?Sized>(&self, cert: &C) -> Option<String> {
        match self.try_certificate_summary(cert) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::debug!(error = %e, "no certificate summary");
                None
            }
        }
    }

    /// Like [`code_signature`](Self::code_signature), keeping the error.
    ///
    /// # Errors
    ///
    /// * [`Error::Io`] / [`Error::Bundle`] - the location cannot be resolved
    /// * [`Error::MachO`] - not a Mach-O, or the requested architecture is missing
    /// * [`Error::NotSigned`] - the selected slice carries no signature
    /// * [`Error::Signature`], [`Error::Entitlements`], [`Error::Plist`],
    ///   [`Error::Certificate`] - a signature component is malformed
    pub fn try_code_signature(&self, location: impl AsRef<Path>) -> Result<SigningInfo> {
        let resolved = ResolvedLocation::resolve(location)?;
        let macho = MachOFile::open(resolved.executable())?;
        let slice = macho.select_slice(self.architecture.as_deref())?;
        tracing::trace!(
            executable = %resolved.executable().display(),
            arch = %slice.arch_name(),
            "selected slice"
        );

        let signature = EmbeddedSignature::parse(macho.signature_bytes(slice)?)?;
        let primary = signature.primary_code_directory()?;
        let digest_algorithm = primary
            .hash_type()
            .ok_or_else(|| Error::Signature("unsupported CodeDirectory hash type".into()))?;
        let unique = primary
            .cdhash()
            .ok_or_else(|| Error::Signature("unsupported CodeDirectory hash type".into()))?;

        let format = if resolved.is_bundle() {
            format!("bundle with {}", macho.format_description())
        } else {
            macho.format_description()
        };

        let certificates = if self.flags.contains(InspectFlags::SIGNING_INFORMATION) {
            signature
                .cms()
                .map(certificates_from_cms)
                .transpose()?
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let (entitlements, entitlements_dict, requirement_data) =
            if self.flags.contains(InspectFlags::REQUIREMENT_INFORMATION) {
                (
                    signature.entitlements_blob().map(<[u8]>::to_vec),
                    signature.entitlements()?,
                    signature.requirements().map(<[u8]>::to_vec),
                )
            } else {
                (None, None, None)
            };

        // Directories with an unknown hash type have no CDHash; skip them in
        // both lists so the entries stay paired
        let (digest_algorithms, cdhashes): (Vec<u8>, Vec<_>) = signature
            .code_directories()
            .iter()
            .filter_map(|cd| Some((cd.raw_hash_type(), cd.cdhash()?)))
            .unzip();

        Ok(SigningInfo {
            identifier: primary.identifier().to_string(),
            format,
            main_executable: resolved.executable().to_path_buf(),
            flags: primary.raw_flags(),
            digest_algorithm,
            digest_algorithms,
            unique,
            cdhashes,
            team_id: primary.team_id().map(str::to_string),
            platform_identifier: Some(primary.platform()).filter(|&p| p != 0),
            runtime_version: primary.runtime_version(),
            adhoc: signature.is_adhoc(),
            info_plist: resolved.info_plist().cloned(),
            certificates,
            entitlements,
            entitlements_dict,
            requirement_data,
        })
    }

    /// Like [`certificate_summary`](Self::certificate_summary), keeping the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] for a null handle, invalid DER, or a
    /// certificate whose subject yields no text.
    pub fn try_certificate_summary<C: CertificateHandle + ?Sized>(
        &self,
        cert: &C,
    ) -> Result<String> {
        Certificate::from_handle(cert)?
            .summary()
            .ok_or_else(|| Error::Certificate("certificate subject is empty".into()))
    }
}

/// Signing information for `location` using default options.
pub fn get_code_signature(location: impl AsRef<Path>) -> Option<SigningInfo> {
    SignatureInspector::new().code_signature(location)
}

/// Summary of `cert` using default options.
pub fn get_certificate_summary<C: CertificateHandle + ?Sized>(cert: &C) -> Option<String> {
    SignatureInspector::new().certificate_summary(cert)
}
