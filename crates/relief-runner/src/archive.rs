//! Zip packaging of generated models.

use std::fs::File;
use std::io::{self, Cursor};
use std::path::Path;
use zip::result::{ZipError, ZipResult};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate the given files into an in-memory zip, stored under their file
/// names.
pub fn zip_files<'a, I>(paths: I) -> ZipResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ZipError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("no usable file name in {}", path.display()),
                ))
            })?;
        zip.start_file(name, options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }

    Ok(zip.finish()?.into_inner())
}
