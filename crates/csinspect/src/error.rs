//! Error types for csinspect operations.
//!
//! This module defines the [`enum@Error`] enum covering every reason an
//! inspection can come back empty: I/O, bundle layout, Mach-O parsing,
//! signature structure, entitlements and certificate problems.
//!
//! The public query operations collapse all of these into an absent result.
//! The `try_*` variants on [`crate::SignatureInspector`] return them intact.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for csinspect operations.
///
/// # Examples
///
/// ```no_run
/// use csinspect::{Error, SignatureInspector};
///
/// match SignatureInspector::new().try_code_signature("/Applications/Safari.app") {
///     Ok(info) => println!("Signed as {}", info.identifier()),
///     Err(Error::NotSigned) => eprintln!("code object is not signed at all"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// The location could not be read, or a bundle component is missing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The location is a directory that does not look like a bundle.
    ///
    /// Raised when `Info.plist` or `CFBundleExecutable` cannot be found.
    #[error("Invalid bundle: {0}")]
    Bundle(String),

    /// Invalid or unsupported Mach-O binary format.
    ///
    /// Also raised when the requested architecture is unknown or absent
    /// from a universal binary.
    #[error("Invalid Mach-O: {0}")]
    MachO(String),

    /// The selected slice carries no `LC_CODE_SIGNATURE` load command.
    #[error("code object is not signed at all")]
    NotSigned,

    /// The embedded signature is truncated or structurally invalid.
    #[error("Malformed signature: {0}")]
    Signature(String),

    /// An entitlements blob could not be decoded.
    #[error("Invalid entitlements: {0}")]
    Entitlements(String),

    /// Invalid, null or unparsable certificate, or a bad CMS blob.
    #[error("Invalid certificate: {0}")]
    Certificate(String),

    /// Property list parsing failed.
    ///
    /// Failed to parse `Info.plist` or XML entitlements.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),
}
