use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Magic-number families the `native` fallback plugin recognizes
/// (spec.md §4.1 `detectCommand` "raw ELF/Mach-O magic").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Elf,
    MachO,
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

// 32-bit and 64-bit, both byte orders, plus the universal ("fat") binary magic.
const MACHO_MAGIC_32: [u8; 4] = [0xfe, 0xed, 0xfa, 0xce];
const MACHO_MAGIC_32_REV: [u8; 4] = [0xce, 0xfa, 0xed, 0xfe];
const MACHO_MAGIC_64: [u8; 4] = [0xfe, 0xed, 0xfa, 0xcf];
const MACHO_MAGIC_64_REV: [u8; 4] = [0xcf, 0xfa, 0xed, 0xfe];
const MACHO_MAGIC_FAT: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
const MACHO_MAGIC_FAT_REV: [u8; 4] = [0xbe, 0xba, 0xfe, 0xca];

/// Reads the first 4 bytes of `path` and classifies them. Returns `None` for
/// unreadable paths, empty files, or unrecognized magic (e.g. shell scripts,
/// text launchers) — those are left to the language-specific plugins.
pub fn detect_binary_format(path: &Path) -> Option<BinaryFormat> {
    let mut file = File::open(path).ok()?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).ok()?;

    if magic == ELF_MAGIC {
        return Some(BinaryFormat::Elf);
    }
    if [
        MACHO_MAGIC_32,
        MACHO_MAGIC_32_REV,
        MACHO_MAGIC_64,
        MACHO_MAGIC_64_REV,
        MACHO_MAGIC_FAT,
        MACHO_MAGIC_FAT_REV,
    ]
    .contains(&magic)
    {
        return Some(BinaryFormat::MachO);
    }
    None
}

/// Reads up to `cap` bytes of `path` and reports whether any of `needles`
/// appears as a byte substring. Used by the .NET plugin's framework-dependent
/// launcher heuristic (spec.md §9 Open Questions: size-capped scan for
/// `DOTNET_BUNDLE`/`hostfxr`/`hostpolicy`).
pub fn contains_any_bytes(path: &Path, needles: &[&[u8]], cap: usize) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; cap];
    let mut len = 0;
    loop {
        let n = file.read(&mut buf[len..])?;
        if n == 0 {
            break;
        }
        len += n;
        if len == buf.len() {
            break;
        }
    }
    buf.truncate(len);
    Ok(needles.iter().any(|needle| {
        !needle.is_empty() && buf.windows(needle.len()).any(|window| window == *needle)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn recognizes_elf_magic() {
        let f = write_temp(&[0x7f, b'E', b'L', b'F', 0x02, 0x01]);
        assert_eq!(detect_binary_format(f.path()), Some(BinaryFormat::Elf));
    }

    #[test]
    fn recognizes_macho_64_magic() {
        let f = write_temp(&[0xfe, 0xed, 0xfa, 0xcf, 0x07, 0x00]);
        assert_eq!(detect_binary_format(f.path()), Some(BinaryFormat::MachO));
    }

    #[test]
    fn rejects_unrecognized_magic() {
        let f = write_temp(b"#!/bin/sh\necho hi\n");
        assert_eq!(detect_binary_format(f.path()), None);
    }

    #[test]
    fn finds_needle_within_cap() {
        let mut bytes = vec![b'x'; 100];
        bytes.extend_from_slice(b"DOTNET_BUNDLE");
        let f = write_temp(&bytes);
        assert!(contains_any_bytes(f.path(), &[b"DOTNET_BUNDLE"], 1024).unwrap());
        assert!(!contains_any_bytes(f.path(), &[b"DOTNET_BUNDLE"], 50).unwrap());
    }
}
