//! Code signing structures and constants for iOS/macOS binaries

pub mod code_directory;
pub mod constants;
pub mod der;
pub mod signature;
pub mod superblob;

pub use code_directory::{CodeDirectory, CodeSignatureFlags, HashType};
pub use signature::EmbeddedSignature;
