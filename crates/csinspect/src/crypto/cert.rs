//! X.509 certificate access and summaries.
//!
//! Certificates reach the inspector in two ways: embedded in the CMS blob of
//! a signature, or as a handle owned by some other part of the application.
//! [`CertificateHandle`] abstracts over the latter; [`Certificate`] is the
//! parsed, owned form both paths end up in.
//!
//! # Examples
//!
//! ```no_run
//! use csinspect::crypto::Certificate;
//!
//! let data = std::fs::read("developer.cer")?;
//! let cert = Certificate::from_der_or_pem(&data)?;
//! println!("{}", cert.summary().unwrap_or_default());
//! # Ok::<(), csinspect::Error>(())
//! ```

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use x509_certificate::{CapturedX509Certificate, X509Certificate};

/// A borrowed reference to a certificate owned elsewhere.
///
/// Implementors hand out the DER encoding for the duration of a call. A
/// handle that does not refer to a certificate (the equivalent of a null
/// reference) returns `None`.
pub trait CertificateHandle {
    /// DER encoding of the referenced certificate.
    fn certificate_der(&self) -> Option<&[u8]>;
}

impl CertificateHandle for [u8] {
    fn certificate_der(&self) -> Option<&[u8]> {
        Some(self).filter(|der| !der.is_empty())
    }
}

impl CertificateHandle for Vec<u8> {
    fn certificate_der(&self) -> Option<&[u8]> {
        self.as_slice().certificate_der()
    }
}

impl CertificateHandle for CapturedX509Certificate {
    fn certificate_der(&self) -> Option<&[u8]> {
        Some(self.constructed_data())
    }
}

impl CertificateHandle for Certificate {
    fn certificate_der(&self) -> Option<&[u8]> {
        Some(self.der())
    }
}

impl<T: CertificateHandle + ?Sized> CertificateHandle for &T {
    fn certificate_der(&self) -> Option<&[u8]> {
        (**self).certificate_der()
    }
}

impl<T: CertificateHandle> CertificateHandle for Option<T> {
    fn certificate_der(&self) -> Option<&[u8]> {
        self.as_ref().and_then(CertificateHandle::certificate_der)
    }
}

/// A parsed X.509 certificate.
#[derive(Clone, Debug)]
pub struct Certificate {
    inner: CapturedX509Certificate,
}

impl Certificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the data is not a valid certificate.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let inner = CapturedX509Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate DER: {}", e)))?;
        Ok(Self { inner })
    }

    /// Parse a PEM-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the PEM armour or the certificate
    /// inside it is invalid.
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self> {
        let inner = CapturedX509Certificate::from_pem(pem)
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate PEM: {}", e)))?;
        Ok(Self { inner })
    }

    /// Parse a certificate that may be either PEM or DER.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] if the data is neither.
    pub fn from_der_or_pem(data: &[u8]) -> Result<Self> {
        let trimmed = data
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .map_or(&data[..0], |start| &data[start..]);

        if trimmed.starts_with(b"-----BEGIN") {
            Self::from_pem(trimmed)
        } else {
            Self::from_der(data)
        }
    }

    /// Parse the certificate a handle refers to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Certificate`] for a null handle or invalid DER.
    pub fn from_handle<C: CertificateHandle + ?Sized>(handle: &C) -> Result<Self> {
        let der = handle
            .certificate_der()
            .ok_or_else(|| Error::Certificate("null certificate handle".into()))?;
        Self::from_der(der)
    }

    /// Short human-readable description of the subject.
    ///
    /// Uses the common name, then the organizational unit, then the
    /// organization, and finally the whole subject. Never returns an empty
    /// string.
    pub fn summary(&self) -> Option<String> {
        self.common_name()
            .or_else(|| self.organizational_unit())
            .or_else(|| self.organization())
            .or_else(|| self.subject())
    }

    /// Subject common name (CN).
    pub fn common_name(&self) -> Option<String> {
        non_empty(self.inner.subject_common_name())
    }

    /// First subject organizational unit (OU).
    ///
    /// Apple developer certificates store the Team ID here.
    pub fn organizational_unit(&self) -> Option<String> {
        self.inner
            .subject_name()
            .iter_organizational_unit()
            .find_map(|atav| non_empty(atav.to_string().ok()))
    }

    /// First subject organization (O).
    pub fn organization(&self) -> Option<String> {
        self.inner
            .subject_name()
            .iter_organization()
            .find_map(|atav| non_empty(atav.to_string().ok()))
    }

    /// Subject distinguished name as a display string.
    pub fn subject(&self) -> Option<String> {
        non_empty(self.inner.subject_name().user_friendly_str().ok())
    }

    /// Issuer distinguished name as a display string.
    pub fn issuer(&self) -> Option<String> {
        non_empty(self.inner.issuer_name().user_friendly_str().ok())
    }

    /// Serial number as lowercase hex.
    pub fn serial_number(&self) -> String {
        hex::encode(self.inner.serial_number_asn1().as_slice())
    }

    /// Start of the validity window.
    pub fn not_before(&self) -> DateTime<Utc> {
        self.inner.validity_not_before()
    }

    /// End of the validity window.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.inner.validity_not_after()
    }

    /// SHA-1 fingerprint of the DER encoding, lowercase hex.
    pub fn sha1_fingerprint(&self) -> String {
        hex::encode(Sha1::digest(self.der()))
    }

    /// SHA-256 fingerprint of the DER encoding, lowercase hex.
    pub fn sha256_fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.der()))
    }

    /// The DER encoding this certificate was parsed from.
    pub fn der(&self) -> &[u8] {
        self.inner.constructed_data()
    }

    /// Access the underlying parsed certificate.
    pub fn as_x509(&self) -> &X509Certificate {
        &self.inner
    }
}

impl From<CapturedX509Certificate> for Certificate {
    fn from(inner: CapturedX509Certificate) -> Self {
        Self { inner }
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der() == other.der()
    }
}

impl Eq for Certificate {}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ROOT_DER: &[u8] = include_bytes!("../../tests/fixtures/root.der");
    pub(crate) const LEAF_DER: &[u8] = include_bytes!("../../tests/fixtures/leaf.der");
    const LEAF_PEM: &[u8] = include_bytes!("../../tests/fixtures/leaf.pem");
    const NO_CN_DER: &[u8] = include_bytes!("../../tests/fixtures/nocn.der");
    const ORG_ONLY_DER: &[u8] = include_bytes!("../../tests/fixtures/orgonly.der");

    #[test]
    fn test_leaf_details() {
        let cert = Certificate::from_der(LEAF_DER).unwrap();

        assert_eq!(
            cert.summary().as_deref(),
            Some("Apple Development: Jane Appleseed (TEAMID1234)")
        );
        assert_eq!(cert.organizational_unit().as_deref(), Some("TEAMID1234"));
        assert_eq!(cert.organization().as_deref(), Some("Jane Appleseed"));
        assert!(cert.issuer().unwrap().contains("Example Root CA"));
        assert!(cert.not_before() < cert.not_after());
        assert_eq!(cert.der(), LEAF_DER);
        assert!(!cert.serial_number().is_empty());
    }

    #[test]
    fn test_fingerprints() {
        let cert = Certificate::from_der(LEAF_DER).unwrap();
        assert_eq!(
            cert.sha1_fingerprint(),
            "882852fdd3771e0fe5eb549d6e98d8e25a379430"
        );
        assert_eq!(
            cert.sha256_fingerprint(),
            "c1d11c71af0360c7a793293b4da9d328f49443e578ea1fb0977b46017b57b0e2"
        );
    }

    #[test]
    fn test_summary_falls_back_to_organizational_unit() {
        let cert = Certificate::from_der(NO_CN_DER).unwrap();
        assert_eq!(cert.common_name(), None);
        assert_eq!(cert.summary().as_deref(), Some("Release Engineering"));
    }

    #[test]
    fn test_summary_falls_back_to_organization() {
        let cert = Certificate::from_der(ORG_ONLY_DER).unwrap();
        assert_eq!(cert.organizational_unit(), None);
        assert_eq!(cert.summary().as_deref(), Some("Example Org"));
    }

    #[test]
    fn test_pem_and_der_agree() {
        let from_pem = Certificate::from_der_or_pem(LEAF_PEM).unwrap();
        let from_der = Certificate::from_der_or_pem(LEAF_DER).unwrap();
        assert_eq!(from_pem.der(), from_der.der());
    }

    #[test]
    fn test_invalid_data() {
        assert!(Certificate::from_der(b"not a certificate".to_vec()).is_err());
        assert!(Certificate::from_der_or_pem(b"-----BEGIN CERTIFICATE-----\n").is_err());
        assert!(Certificate::from_der_or_pem(b"").is_err());
    }

    #[test]
    fn test_handles() {
        let bytes: &[u8] = LEAF_DER;
        assert_eq!(bytes.certificate_der(), Some(LEAF_DER));
        assert_eq!(LEAF_DER.to_vec().certificate_der(), Some(LEAF_DER));

        let empty: &[u8] = &[];
        assert_eq!(empty.certificate_der(), None);

        let null: Option<Certificate> = None;
        assert_eq!(null.certificate_der(), None);
        assert!(Certificate::from_handle(&null).is_err());

        let cert = Certificate::from_der(ROOT_DER).unwrap();
        assert_eq!(Some(&cert).certificate_der(), Some(ROOT_DER));
        assert_eq!(
            Certificate::from_handle(&cert).unwrap().summary().as_deref(),
            Some("Example Root CA")
        );
    }
}
