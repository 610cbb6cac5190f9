//! Certificates carried in a CMS signature blob
//!
//! Uses cryptographic-message-syntax crate for CMS SignedData parsing. Only
//! the certificate set is read; signer infos are not verified.

use super::cert::Certificate;
use crate::{Error, Result};
use cryptographic_message_syntax::SignedData;

/// Extract the certificates of a CMS SignedData blob, leaf first.
///
/// # Arguments
///
/// * `cms` - BER/DER encoded ContentInfo wrapping SignedData
///
/// # Errors
///
/// Returns [`Error::Certificate`] if the blob is not CMS SignedData.
pub fn certificates_from_cms(cms: &[u8]) -> Result<Vec<Certificate>> {
    let signed_data = SignedData::parse_ber(cms)
        .map_err(|e| Error::Certificate(format!("Failed to parse CMS signature: {}", e)))?;

    let certs: Vec<Certificate> = signed_data
        .certificates()
        .map(|cert| Certificate::from(cert.clone()))
        .collect();

    tracing::trace!(count = certs.len(), "certificates in CMS blob");

    let names: Vec<(Option<String>, Option<String>)> = certs
        .iter()
        .map(|cert| (cert.subject(), cert.issuer()))
        .collect();

    let mut slots: Vec<Option<Certificate>> = certs.into_iter().map(Some).collect();
    Ok(chain_order(&names)
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Order certificates from leaf to root.
///
/// `names` holds the (subject, issuer) of each certificate. The leaf is the
/// first certificate that issued none of the others; each following entry
/// is the issuer of the one before it. Certificates that cannot be placed
/// are appended in their original order. Returns a permutation of indices.
pub fn chain_order(names: &[(Option<String>, Option<String>)]) -> Vec<usize> {
    let issued_something = |index: usize| {
        let subject = &names[index].0;
        subject.is_some()
            && names
                .iter()
                .enumerate()
                .any(|(other, (other_subject, issuer))| {
                    other != index && issuer == subject && other_subject != subject
                })
    };

    let mut placed = vec![false; names.len()];
    let mut order = Vec::with_capacity(names.len());

    let mut current = (0..names.len()).find(|&index| !issued_something(index));
    while let Some(index) = current {
        placed[index] = true;
        order.push(index);

        let (subject, issuer) = &names[index];
        if issuer.is_none() || issuer == subject {
            break;
        }
        current = (0..names.len()).find(|&next| !placed[next] && names[next].0 == *issuer);
    }

    order.extend((0..names.len()).filter(|&index| !placed[index]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::cert::tests::{LEAF_DER, ROOT_DER};

    const SIGNATURE_CMS: &[u8] = include_bytes!("../../tests/fixtures/signature.cms");

    fn name(subject: &str, issuer: &str) -> (Option<String>, Option<String>) {
        (Some(subject.to_string()), Some(issuer.to_string()))
    }

    #[test]
    fn test_certificates_from_signature() {
        let certs = certificates_from_cms(SIGNATURE_CMS).unwrap();

        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].der(), LEAF_DER);
        assert_eq!(certs[1].der(), ROOT_DER);
    }

    #[test]
    fn test_not_cms() {
        assert!(matches!(
            certificates_from_cms(&[0x30, 0x00]),
            Err(Error::Certificate(_))
        ));
        assert!(certificates_from_cms(b"garbage").is_err());
    }

    #[test]
    fn test_chain_order_reorders_root_first_input() {
        let names = vec![
            name("Root", "Root"),
            name("Intermediate", "Root"),
            name("Leaf", "Intermediate"),
        ];
        assert_eq!(chain_order(&names), vec![2, 1, 0]);
    }

    #[test]
    fn test_chain_order_already_ordered() {
        let names = vec![
            name("Leaf", "Intermediate"),
            name("Intermediate", "Root"),
            name("Root", "Root"),
        ];
        assert_eq!(chain_order(&names), vec![0, 1, 2]);
    }

    #[test]
    fn test_chain_order_appends_unrelated() {
        let names = vec![
            name("Other", "Elsewhere"),
            name("Root", "Root"),
            name("Leaf", "Root"),
        ];
        // "Other" issued nothing, so it is taken as the leaf; its issuer is absent
        assert_eq!(chain_order(&names), vec![0, 1, 2]);
    }

    #[test]
    fn test_chain_order_missing_names() {
        let names = vec![(None, None), name("Leaf", "Root"), name("Root", "Root")];
        assert_eq!(chain_order(&names), vec![0, 1, 2]);
        assert!(chain_order(&[]).is_empty());
    }
}
