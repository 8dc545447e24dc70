use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    Rar,
    Tar(TarCompress),
}

/// Compression codec for tar archives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TarCompress {
    None,
    Gzip,
    Xz,
    Zstd,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Zip => "zip",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
            Self::Tar(TarCompress::None) => "tar",
            Self::Tar(TarCompress::Gzip) => "tar.gz",
            Self::Tar(TarCompress::Xz) => "tar.xz",
            Self::Tar(TarCompress::Zstd) => "tar.zst",
        };
        f.write_str(name)
    }
}

// Compound suffixes come before their shorter tails.
const EXTENSIONS: &[(&str, ArchiveFormat)] = &[
    (".tar.gz", ArchiveFormat::Tar(TarCompress::Gzip)),
    (".tar.xz", ArchiveFormat::Tar(TarCompress::Xz)),
    (".tar.zst", ArchiveFormat::Tar(TarCompress::Zstd)),
    (".tgz", ArchiveFormat::Tar(TarCompress::Gzip)),
    (".txz", ArchiveFormat::Tar(TarCompress::Xz)),
    (".tar", ArchiveFormat::Tar(TarCompress::None)),
    (".zip", ArchiveFormat::Zip),
    (".7z", ArchiveFormat::SevenZip),
    (".rar", ArchiveFormat::Rar),
];

/// Split a file name into its stem and a recognized archive extension.
///
/// Matching is ASCII case-insensitive and the returned extension keeps the
/// caller's casing. A bare extension such as `.zip` has no stem and is not
/// treated as an archive name.
pub fn split_extension(name: &str) -> Option<(&str, &str, ArchiveFormat)> {
    EXTENSIONS.iter().find_map(|(suffix, format)| {
        let split = name.len().checked_sub(suffix.len())?;
        if split == 0 || !name.is_char_boundary(split) {
            return None;
        }
        let (stem, ext) = name.split_at(split);
        ext.eq_ignore_ascii_case(suffix).then_some((stem, ext, *format))
    })
}

pub fn from_extension(name: &str) -> Option<ArchiveFormat> {
    split_extension(name).map(|(_, _, format)| format)
}

pub fn detect_format(data: &[u8]) -> Option<ArchiveFormat> {
    match data {
        [0x50, 0x4B, 0x03, 0x04, ..]
        | [0x50, 0x4B, 0x05, 0x06, ..]
        | [0x50, 0x4B, 0x07, 0x08, ..] => Some(ArchiveFormat::Zip),
        [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x00, ..]
        | [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07, 0x01, 0x00, ..] => Some(ArchiveFormat::Rar),
        [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, ..] => Some(ArchiveFormat::SevenZip),
        [0x1F, 0x8B, ..] => Some(ArchiveFormat::Tar(TarCompress::Gzip)),
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Some(ArchiveFormat::Tar(TarCompress::Zstd)),
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Some(ArchiveFormat::Tar(TarCompress::Xz)),
        _ => {
            if is_tar_header(data) {
                Some(ArchiveFormat::Tar(TarCompress::None))
            } else {
                None
            }
        }
    }
}

fn is_tar_header(data: &[u8]) -> bool {
    data.len() >= 512 && data[257..262] == *b"ustar"
}

/// Sniff the format from the first block of `reader`, then rewind it.
pub fn detect_from_reader<R: Read + Seek>(reader: &mut R) -> io::Result<Option<ArchiveFormat>> {
    let mut header = Vec::with_capacity(512);
    reader.by_ref().take(512).read_to_end(&mut header)?;
    reader.rewind()?;
    Ok(detect_format(&header))
}

pub fn sniff_path(path: &Path) -> io::Result<Option<ArchiveFormat>> {
    let mut file = File::open(path)?;
    detect_from_reader(&mut file)
}
