use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use super::Extracted;
use crate::error::{Error, Result};
use crate::format::TarCompress;
use crate::sanitize::sanitize_path;

pub(super) fn extract(archive: &Path, destination: &Path, codec: TarCompress) -> Result<Extracted> {
    let file = File::open(archive).map_err(|e| Error::ExtractionFailed {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let reader = wrap_reader(BufReader::new(file), codec)?;
    let mut tar = tar::Archive::new(reader);
    let mut extracted = Extracted::default();

    for entry in tar.entries().map_err(|_| Error::Corrupted)? {
        let mut entry = entry.map_err(|_| Error::Corrupted)?;
        let raw_path = entry.path().map_err(|_| Error::InvalidPath)?.into_owned();
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            extracted.directory(sanitize_path(&raw_path, destination)?)?;
        } else if entry_type.is_file() {
            extracted.file(sanitize_path(&raw_path, destination)?, &mut entry)?;
        } else {
            debug!(entry = %raw_path.display(), ?entry_type, "skipping non-regular tar entry");
        }
    }

    Ok(extracted)
}

fn wrap_reader<R: Read + 'static>(reader: R, codec: TarCompress) -> Result<Box<dyn Read>> {
    match codec {
        TarCompress::None => Ok(Box::new(reader)),
        TarCompress::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        #[cfg(feature = "xz")]
        TarCompress::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        #[cfg(not(feature = "xz"))]
        TarCompress::Xz => Err(Error::UnsupportedFormat),
        #[cfg(feature = "zstd")]
        TarCompress::Zstd => {
            let decoder = zstd::stream::Decoder::new(reader).map_err(|_| Error::Corrupted)?;
            Ok(Box::new(decoder))
        }
        #[cfg(not(feature = "zstd"))]
        TarCompress::Zstd => Err(Error::UnsupportedFormat),
    }
}
