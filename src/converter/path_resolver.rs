//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path derivati da un archivio sorgente:
//! working directory temporanea e PDF di output.

use crate::error::ConvertError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Utility per calcolare i path in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// Working directory for `source`: `<target>/.<file name>.<hash>.work`.
    ///
    /// The hash of the full source path keeps `book.cbr` and `book.cbz`, or two
    /// archives with the same name in different folders, from sharing a directory.
    pub fn working_dir(target_dir: &Path, source: &Path) -> Result<PathBuf, ConvertError> {
        let file_name = Self::file_name(source)?;
        let digest = Sha256::digest(source.to_string_lossy().as_bytes());
        let short_hash = hex::encode(&digest[..4]);
        Ok(target_dir.join(format!(".{}.{}.work", file_name, short_hash)))
    }

    /// Output PDF for `source`: `<target>/<stem>.pdf`
    pub fn pdf_path(target_dir: &Path, source: &Path) -> Result<PathBuf, ConvertError> {
        let stem = source
            .file_stem()
            .ok_or_else(|| Self::invalid_name(source))?
            .to_string_lossy();
        Ok(target_dir.join(format!("{}.pdf", stem)))
    }

    fn file_name(source: &Path) -> Result<String, ConvertError> {
        source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Self::invalid_name(source))
    }

    fn invalid_name(source: &Path) -> ConvertError {
        ConvertError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Invalid file name: {}", source.display()),
        ))
    }
}
