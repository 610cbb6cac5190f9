//! Code signature inspection for Apple executables and bundles.
//!
//! Reads the embedded code signature of Mach-O files (thin or universal) and
//! app bundles without any platform security framework, and describes the
//! certificates that signed them. Nothing is verified: the crate reports
//! what a signature claims, not whether the claim holds.
//!
//! # Examples
//!
//! ```no_run
//! use csinspect::{get_certificate_summary, get_code_signature};
//!
//! if let Some(info) = get_code_signature("/Applications/Safari.app") {
//!     println!("identifier: {}", info.identifier());
//!     if let Some(leaf) = info.certificates().first() {
//!         println!("signed by: {:?}", get_certificate_summary(leaf));
//!     }
//! }
//! ```

pub mod bundle;
pub mod codesign;
pub mod crypto;
pub mod error;
pub mod info;
pub mod inspector;
pub mod macho;

pub use crypto::{Certificate, CertificateHandle};
pub use error::Error;
pub use info::SigningInfo;
pub use inspector::{get_certificate_summary, get_code_signature, InspectFlags, SignatureInspector};

pub type Result<T> = std::result::Result<T, Error>;
