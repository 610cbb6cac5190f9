//! Resolve an inspected location to its main executable
//!
//! A location is either a Mach-O file or a bundle directory. Bundles come in
//! two layouts: the macOS one (`Contents/Info.plist`, executable under
//! `Contents/MacOS/`) and the flat iOS one (`Info.plist` and the executable
//! at the bundle root).

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Info.plist key naming the main executable
const BUNDLE_EXECUTABLE_KEY: &str = "CFBundleExecutable";

/// A location resolved to the file that carries the signature.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    executable: PathBuf,
    bundle: Option<PathBuf>,
    info_plist: Option<Dictionary>,
}

impl ResolvedLocation {
    /// Resolve a file or bundle directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the location cannot be read, [`Error::Plist`]
    /// for an unparsable Info.plist, and [`Error::Bundle`] for a directory
    /// that is not a bundle or names no executable.
    pub fn resolve(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let metadata = fs::metadata(location)?;

        if !metadata.is_dir() {
            return Ok(Self {
                executable: location.to_path_buf(),
                bundle: None,
                info_plist: None,
            });
        }

        let (info_plist_path, executable_dir) = bundle_layout(location).ok_or_else(|| {
            Error::Bundle(format!("{}: no Info.plist found", location.display()))
        })?;

        let info_plist = read_info_plist(&info_plist_path)?;
        let name = info_plist
            .get(BUNDLE_EXECUTABLE_KEY)
            .and_then(Value::as_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Bundle(format!(
                    "{}: Info.plist has no {}",
                    location.display(),
                    BUNDLE_EXECUTABLE_KEY
                ))
            })?;

        let executable = executable_dir.join(name);
        if !executable.is_file() {
            return Err(Error::Bundle(format!(
                "main executable {} is missing",
                executable.display()
            )));
        }

        tracing::trace!(
            bundle = %location.display(),
            executable = %executable.display(),
            "resolved bundle"
        );

        Ok(Self {
            executable,
            bundle: Some(location.to_path_buf()),
            info_plist: Some(info_plist),
        })
    }

    /// File holding the code signature.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Bundle root, if the location was a bundle.
    pub fn bundle(&self) -> Option<&Path> {
        self.bundle.as_deref()
    }

    /// The bundle's Info.plist.
    pub fn info_plist(&self) -> Option<&Dictionary> {
        self.info_plist.as_ref()
    }

    /// True when the location was a bundle directory.
    pub fn is_bundle(&self) -> bool {
        self.bundle.is_some()
    }
}

/// Locate Info.plist and the directory holding the executable.
fn bundle_layout(bundle: &Path) -> Option<(PathBuf, PathBuf)> {
    let contents = bundle.join("Contents");
    let macos_plist = contents.join("Info.plist");
    if macos_plist.is_file() {
        return Some((macos_plist, contents.join("MacOS")));
    }

    let flat_plist = bundle.join("Info.plist");
    flat_plist
        .is_file()
        .then(|| (flat_plist, bundle.to_path_buf()))
}

/// Read an XML or binary Info.plist, which must be a dictionary.
fn read_info_plist(path: &Path) -> Result<Dictionary> {
    let data = fs::read(path)?;
    let plist: Value = plist::from_bytes(&data)?;

    plist
        .into_dictionary()
        .ok_or_else(|| Error::Bundle(format!("{} is not a dictionary", path.display())))
}
