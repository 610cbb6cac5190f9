//! Mach-O file parsing using goblin
//!
//! Only what an inspection needs is kept per architecture slice: where the
//! slice lives in the file, its CPU type, and the `LC_CODE_SIGNATURE` range.

use crate::{Error, Result};
use goblin::mach::cputype::{get_arch_from_flag, get_arch_name_from_types, CpuSubType, CpuType};
use goblin::mach::load_command::CommandVariant;
use goblin::mach::{Mach, MachO};
use std::path::Path;

/// Capability bits stored in the top byte of `cpusubtype`
const CPU_SUBTYPE_MASK: u32 = 0xff00_0000;

/// Represents a parsed Mach-O file
pub struct MachOFile {
    /// Raw file data
    data: Vec<u8>,
    /// Is FAT binary
    is_fat: bool,
    /// Architecture slices
    slices: Vec<ArchSlice>,
}

/// A single architecture slice
#[derive(Debug, Clone)]
pub struct ArchSlice {
    /// Offset in file
    pub offset: usize,
    /// Size of slice
    pub size: usize,
    /// CPU type
    pub cpu_type: CpuType,
    /// CPU subtype with capability bits cleared
    pub cpu_subtype: CpuSubType,
    /// Is 64-bit
    pub is_64: bool,
    /// Mach-O filetype (MH_EXECUTE, MH_DYLIB, ...)
    pub filetype: u32,
    /// Code signature offset relative to the slice (if signed)
    pub code_sig_offset: Option<u32>,
    /// Code signature size
    pub code_sig_size: Option<u32>,
}

impl ArchSlice {
    /// Architecture name as used by `lipo`, e.g. `arm64` or `x86_64`.
    pub fn arch_name(&self) -> String {
        get_arch_name_from_types(self.cpu_type, self.cpu_subtype)
            .map(str::to_string)
            .unwrap_or_else(|| format!("cpu 0x{:x}/0x{:x}", self.cpu_type, self.cpu_subtype))
    }

    /// Whether this slice carries an `LC_CODE_SIGNATURE` load command.
    pub fn is_signed(&self) -> bool {
        self.code_sig_offset.is_some()
    }
}

impl MachOFile {
    /// Open and parse a Mach-O file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse(data)
    }

    /// Parse Mach-O from bytes
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let mach = Mach::parse(&data)
            .map_err(|e| Error::MachO(format!("Failed to parse: {}", e)))?;

        let (is_fat, slices) = match mach {
            Mach::Binary(macho) => {
                let slice = Self::parse_single(&macho, 0, data.len());
                (false, vec![slice])
            }
            Mach::Fat(fat) => {
                let mut slices = Vec::new();
                for (i, arch) in fat.iter_arches().enumerate() {
                    let arch = arch.map_err(|e| Error::MachO(format!("Fat arch {}: {}", i, e)))?;
                    let offset = arch.offset as usize;
                    let size = arch.size as usize;
                    let slice_data = offset
                        .checked_add(size)
                        .and_then(|end| data.get(offset..end))
                        .ok_or_else(|| {
                            Error::MachO(format!("Fat arch {} extends past end of file", i))
                        })?;

                    let macho = MachO::parse(slice_data, 0)
                        .map_err(|e| Error::MachO(format!("Slice {}: {}", i, e)))?;

                    slices.push(Self::parse_single(&macho, offset, size));
                }
                if slices.is_empty() {
                    return Err(Error::MachO("universal binary has no architectures".into()));
                }
                (true, slices)
            }
        };

        Ok(Self { data, is_fat, slices })
    }

    fn parse_single(macho: &MachO, offset: usize, size: usize) -> ArchSlice {
        let mut code_sig_offset = None;
        let mut code_sig_size = None;

        for lc in &macho.load_commands {
            if let CommandVariant::CodeSignature(cs) = lc.command {
                code_sig_offset = Some(cs.dataoff);
                code_sig_size = Some(cs.datasize);
            }
        }

        ArchSlice {
            offset,
            size,
            cpu_type: macho.header.cputype,
            cpu_subtype: macho.header.cpusubtype & !CPU_SUBTYPE_MASK,
            is_64: macho.is_64,
            filetype: macho.header.filetype,
            code_sig_offset,
            code_sig_size,
        }
    }

    /// Is FAT binary
    pub fn is_fat(&self) -> bool {
        self.is_fat
    }

    /// Get architecture slices
    pub fn slices(&self) -> &[ArchSlice] {
        &self.slices
    }

    /// Human readable container description, e.g. `Mach-O thin (arm64)`.
    pub fn format_description(&self) -> String {
        let archs: Vec<String> = self.slices.iter().map(ArchSlice::arch_name).collect();
        let kind = if self.is_fat { "universal" } else { "thin" };
        format!("Mach-O {} ({})", kind, archs.join(" "))
    }

    /// Choose the slice to inspect.
    ///
    /// With `preferred` set, the slice of that architecture name must exist.
    /// Without it, the slice matching the host CPU wins, else the first one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MachO`] for an unknown architecture name or one the
    /// file does not contain.
    pub fn select_slice(&self, preferred: Option<&str>) -> Result<&ArchSlice> {
        if let Some(name) = preferred {
            let (cpu_type, cpu_subtype) = get_arch_from_flag(name)
                .ok_or_else(|| Error::MachO(format!("unknown architecture '{}'", name)))?;
            return self
                .find_exact(cpu_type, cpu_subtype & !CPU_SUBTYPE_MASK)
                .ok_or_else(|| Error::MachO(format!("architecture '{}' not present", name)));
        }

        let host = host_arch_name()
            .and_then(get_arch_from_flag)
            .and_then(|(cpu_type, cpu_subtype)| {
                self.find_exact(cpu_type, cpu_subtype & !CPU_SUBTYPE_MASK)
                    .or_else(|| self.slices.iter().find(|s| s.cpu_type == cpu_type))
            });

        match host {
            Some(slice) => Ok(slice),
            None => self
                .slices
                .first()
                .ok_or_else(|| Error::MachO("no architecture slices".into())),
        }
    }

    fn find_exact(&self, cpu_type: CpuType, cpu_subtype: CpuSubType) -> Option<&ArchSlice> {
        self.slices
            .iter()
            .find(|s| s.cpu_type == cpu_type && s.cpu_subtype == cpu_subtype)
    }

    /// Bytes addressed by the slice's `LC_CODE_SIGNATURE`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSigned`] when the slice has no code signature and
    /// [`Error::Signature`] when the range falls outside the slice.
    pub fn signature_bytes(&self, slice: &ArchSlice) -> Result<&[u8]> {
        let (offset, size) = slice
            .code_sig_offset
            .zip(slice.code_sig_size)
            .ok_or(Error::NotSigned)?;

        let start = offset as usize;
        let end = start
            .checked_add(size as usize)
            .filter(|&end| end <= slice.size)
            .ok_or_else(|| {
                Error::Signature(format!(
                    "code signature at {}+{} outside {} byte slice",
                    offset, size, slice.size
                ))
            })?;

        self.data
            .get(slice.offset + start..slice.offset + end)
            .ok_or_else(|| Error::Signature("code signature outside file".into()))
    }
}

/// `lipo` name of the architecture this process runs on.
fn host_arch_name() -> Option<&'static str> {
    match std::env::consts::ARCH {
        "aarch64" => Some("arm64"),
        "x86_64" => Some("x86_64"),
        "x86" => Some("i386"),
        "arm" => Some("arm"),
        "powerpc" => Some("ppc"),
        "powerpc64" => Some("ppc64"),
        _ => None,
    }
}
