//! Bundle and executable location handling.
//!
//! Inspection accepts either a Mach-O file or a bundle directory. For a
//! bundle, the main executable is found through the `CFBundleExecutable` key
//! of its Info.plist, and the Info.plist itself is reported alongside the
//! signature.
//!
//! # Supported Layouts
//!
//! | Layout | Info.plist | Executable |
//! |--------|------------|------------|
//! | macOS  | `Contents/Info.plist` | `Contents/MacOS/<name>` |
//! | iOS    | `Info.plist` | `<name>` |
//!
//! # Examples
//!
//! ```no_run
//! use csinspect::bundle::ResolvedLocation;
//!
//! let resolved = ResolvedLocation::resolve("/Applications/Safari.app")?;
//! println!("{}", resolved.executable().display());
//! # Ok::<(), csinspect::Error>(())
//! ```

pub mod location;

pub use location::ResolvedLocation;
