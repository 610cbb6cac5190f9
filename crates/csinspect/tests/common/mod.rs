//! Builders for synthetic signed Mach-O images and bundles.
//!
//! The images are minimal but structurally complete: a 64-bit MH_EXECUTE with
//! a __TEXT segment and an `LC_CODE_SIGNATURE` addressing a SuperBlob.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade0cc0;
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xfade0c02;
pub const CSMAGIC_REQUIREMENTS: u32 = 0xfade0c01;
pub const CSMAGIC_REQUIREMENT: u32 = 0xfade0c00;
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xfade7171;
pub const CSMAGIC_EMBEDDED_DER_ENTITLEMENTS: u32 = 0xfade7172;
pub const CSMAGIC_BLOBWRAPPER: u32 = 0xfade0b01;

pub const CSSLOT_CODEDIRECTORY: u32 = 0x0000;
pub const CSSLOT_REQUIREMENTS: u32 = 0x0002;
pub const CSSLOT_ENTITLEMENTS: u32 = 0x0005;
pub const CSSLOT_DER_ENTITLEMENTS: u32 = 0x0007;
pub const CSSLOT_ALTERNATE_CODEDIRECTORIES: u32 = 0x1000;
pub const CSSLOT_SIGNATURESLOT: u32 = 0x10000;

pub const CS_HASHTYPE_SHA1: u8 = 1;
pub const CS_HASHTYPE_SHA256: u8 = 2;

pub const CPU_TYPE_ARM64: u32 = 0x0100_000c;
pub const CPU_SUBTYPE_ARM64_ALL: u32 = 0;

/// Real CMS SignedData over a dummy CodeDirectory: leaf and root certificates.
pub const SIGNATURE_CMS: &[u8] = include_bytes!("../fixtures/signature.cms");
pub const LEAF_DER: &[u8] = include_bytes!("../fixtures/leaf.der");
pub const LEAF_PEM: &[u8] = include_bytes!("../fixtures/leaf.pem");
pub const ROOT_DER: &[u8] = include_bytes!("../fixtures/root.der");

pub const LEAF_SUMMARY: &str = "Apple Development: Jane Appleseed (TEAMID1234)";

pub const ENTITLEMENTS_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>application-identifier</key>
	<string>TEAMID1234.com.example.app</string>
	<key>com.apple.developer.team-identifier</key>
	<string>TEAMID1234</string>
	<key>get-task-allow</key>
	<true/>
</dict>
</plist>
"#;

/// Generic blob: magic, length, payload.
pub fn blob(magic: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend(magic.to_be_bytes());
    out.extend(((8 + payload.len()) as u32).to_be_bytes());
    out.extend(payload);
    out
}

/// SuperBlob holding `blobs` in index order.
pub fn superblob(blobs: &[(u32, Vec<u8>)]) -> Vec<u8> {
    let header_len = 12 + 8 * blobs.len();
    let total = header_len + blobs.iter().map(|(_, b)| b.len()).sum::<usize>();

    let mut out = Vec::with_capacity(total);
    out.extend(CSMAGIC_EMBEDDED_SIGNATURE.to_be_bytes());
    out.extend((total as u32).to_be_bytes());
    out.extend((blobs.len() as u32).to_be_bytes());

    let mut offset = header_len;
    for (slot, b) in blobs {
        out.extend(slot.to_be_bytes());
        out.extend((offset as u32).to_be_bytes());
        offset += b.len();
    }
    for (_, b) in blobs {
        out.extend(b);
    }
    out
}

/// Version 0x20400 CodeDirectory with five zeroed special slots and one code slot.
pub fn code_directory(
    identifier: &str,
    team_id: Option<&str>,
    flags: u32,
    hash_type: u8,
) -> Vec<u8> {
    const HEADER: usize = 88;
    const SPECIAL_SLOTS: usize = 5;

    let hash_size = if hash_type == CS_HASHTYPE_SHA1 { 20 } else { 32 };
    let ident_offset = HEADER;
    let team_offset = ident_offset + identifier.len() + 1;
    let hash_offset = team_offset
        + team_id.map(|t| t.len() + 1).unwrap_or(0)
        + SPECIAL_SLOTS * hash_size;
    let total = hash_offset + hash_size;

    let mut cd = vec![0u8; total];
    let mut put = |at: usize, v: u32| cd[at..at + 4].copy_from_slice(&v.to_be_bytes());
    put(0, CSMAGIC_CODEDIRECTORY);
    put(4, total as u32);
    put(8, 0x20400);
    put(12, flags);
    put(16, hash_offset as u32);
    put(20, ident_offset as u32);
    put(24, SPECIAL_SLOTS as u32);
    put(28, 1);
    put(32, 0x1000);
    if team_id.is_some() {
        put(48, team_offset as u32);
    }
    cd[36] = hash_size as u8;
    cd[37] = hash_type;
    cd[39] = 12;

    cd[ident_offset..ident_offset + identifier.len()].copy_from_slice(identifier.as_bytes());
    if let Some(team) = team_id {
        cd[team_offset..team_offset + team.len()].copy_from_slice(team.as_bytes());
    }
    cd
}

/// Requirements blob with a single designated requirement.
pub fn requirements() -> Vec<u8> {
    // identifier "com.example.app"
    let mut expr = Vec::new();
    expr.extend(1u32.to_be_bytes());
    expr.extend(2u32.to_be_bytes());
    expr.extend(15u32.to_be_bytes());
    expr.extend(b"com.example.app\0");
    let requirement = blob(CSMAGIC_REQUIREMENT, &expr);

    let mut payload = Vec::new();
    payload.extend(1u32.to_be_bytes());
    payload.extend(3u32.to_be_bytes());
    payload.extend(20u32.to_be_bytes());
    payload.extend(&requirement);
    blob(CSMAGIC_REQUIREMENTS, &payload)
}

/// A full signature: SHA-1 and SHA-256 CodeDirectories, requirements,
/// XML entitlements and the given CMS payload (empty for ad-hoc).
pub fn signature(identifier: &str, team_id: Option<&str>, cms: &[u8]) -> Vec<u8> {
    let flags = if cms.is_empty() { 0x2 } else { 0x10000 };
    superblob(&[
        (
            CSSLOT_CODEDIRECTORY,
            code_directory(identifier, team_id, flags, CS_HASHTYPE_SHA1),
        ),
        (CSSLOT_REQUIREMENTS, requirements()),
        (CSSLOT_ENTITLEMENTS, blob(CSMAGIC_EMBEDDED_ENTITLEMENTS, ENTITLEMENTS_XML)),
        (
            CSSLOT_ALTERNATE_CODEDIRECTORIES,
            code_directory(identifier, team_id, flags, CS_HASHTYPE_SHA256),
        ),
        (CSSLOT_SIGNATURESLOT, blob(CSMAGIC_BLOBWRAPPER, cms)),
    ])
}

/// 64-bit arm64 MH_EXECUTE, optionally carrying `signature` at offset 0x1000.
pub fn macho(signature: Option<&[u8]>) -> Vec<u8> {
    const SIGNATURE_OFFSET: usize = 0x1000;

    let ncmds: u32 = if signature.is_some() { 2 } else { 1 };
    let sizeofcmds: u32 = 72 + if signature.is_some() { 16 } else { 0 };

    let mut buf = Vec::new();
    for v in [0xfeed_facfu32, CPU_TYPE_ARM64, CPU_SUBTYPE_ARM64_ALL, 2, ncmds, sizeofcmds, 0, 0] {
        buf.extend(v.to_le_bytes());
    }

    buf.extend(0x19u32.to_le_bytes());
    buf.extend(72u32.to_le_bytes());
    let mut segname = [0u8; 16];
    segname[..6].copy_from_slice(b"__TEXT");
    buf.extend(segname);
    for v in [0u64, SIGNATURE_OFFSET as u64, 0, SIGNATURE_OFFSET as u64] {
        buf.extend(v.to_le_bytes());
    }
    for v in [5u32, 5, 0, 0] {
        buf.extend(v.to_le_bytes());
    }

    if let Some(sig) = signature {
        buf.extend(0x1du32.to_le_bytes());
        buf.extend(16u32.to_le_bytes());
        buf.extend((SIGNATURE_OFFSET as u32).to_le_bytes());
        buf.extend((sig.len() as u32).to_le_bytes());
    }

    buf.resize(SIGNATURE_OFFSET, 0);
    if let Some(sig) = signature {
        buf.extend(sig);
    }
    buf
}

/// Bundle directory layouts.
#[derive(Clone, Copy, Debug)]
pub enum Layout {
    /// `Contents/Info.plist`, `Contents/MacOS/<exe>`
    MacOs,
    /// `Info.plist`, `<exe>` at the root
    Ios,
}

/// Write a bundle named `<name>.app` under `parent` and return its path.
pub fn write_bundle(
    parent: &Path,
    name: &str,
    bundle_identifier: &str,
    layout: Layout,
    executable: &[u8],
) -> PathBuf {
    let bundle = parent.join(format!("{}.app", name));
    let (plist_dir, exe_dir) = match layout {
        Layout::MacOs => (bundle.join("Contents"), bundle.join("Contents").join("MacOS")),
        Layout::Ios => (bundle.clone(), bundle.clone()),
    };
    fs::create_dir_all(&exe_dir).unwrap();

    let mut info = plist::Dictionary::new();
    info.insert("CFBundleExecutable".into(), plist::Value::String(name.into()));
    info.insert(
        "CFBundleIdentifier".into(),
        plist::Value::String(bundle_identifier.into()),
    );
    info.insert("CFBundlePackageType".into(), plist::Value::String("APPL".into()));
    plist::to_file_xml(plist_dir.join("Info.plist"), &plist::Value::Dictionary(info)).unwrap();

    fs::write(exe_dir.join(name), executable).unwrap();
    bundle
}
