//! # Archive Extraction Module
//!
//! Questo modulo estrae le pagine di un archivio CBZ/CBR nella working directory.
//!
//! ## Responsabilità:
//! - Riconoscimento del container dai magic bytes (non dall'estensione:
//!   molti `.cbr` sono in realtà ZIP e viceversa)
//! - Lettura sequenziale delle entry tramite `zip` (CBZ) e `unrar` (CBR)
//! - Scrittura "flat" di ogni entry non-directory nella working directory
//! - Naming che preserva l'ordine dell'archivio
//!
//! ## Naming:
//! - `Sequential`: le immagini diventano `00000.jpg`, `00001.png`, ... nell'ordine
//!   delle entry; gli altri file (es. `ComicInfo.xml`) diventano `-00000.xml`, ...
//!   e ordinano prima di tutte le pagine. L'ultimo nome è sempre l'ultima pagina
//! - `BaseName`: solo il nome base dell'entry, sovrascrivendo in caso di collisione
//!
//! ## Errori:
//! Qualsiasi errore di I/O o di formato diventa `ConvertError::Extraction`;
//! non esistono retry parziali sulle singole entry.

use crate::{config::NamingPolicy, error::ConvertError, file_manager::FileManager};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

const ZIP_MAGIC: &[u8] = b"PK";
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";

/// One entry read from an archive
#[derive(Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
    pub data: Vec<u8>,
}

/// Container format detected from the file signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

impl ArchiveFormat {
    /// Sniff the container format from the first bytes of `path`
    pub fn detect(path: &Path) -> Result<Self, ConvertError> {
        let mut header = [0u8; 8];
        let mut file = File::open(path).map_err(extraction_error)?;
        let read = read_prefix(&mut file, &mut header).map_err(extraction_error)?;
        let header = &header[..read];

        if header.starts_with(RAR_MAGIC) {
            Ok(Self::Rar)
        } else if header.starts_with(ZIP_MAGIC) {
            Ok(Self::Zip)
        } else {
            Err(ConvertError::Extraction("unsupported archive format".to_string()))
        }
    }
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

fn extraction_error(err: impl Display) -> ConvertError {
    ConvertError::Extraction(err.to_string())
}

/// Writes the file entries of a comic archive into a working directory
pub struct ArchiveExtractor {
    naming: NamingPolicy,
}

impl ArchiveExtractor {
    pub fn new(naming: NamingPolicy) -> Self {
        Self { naming }
    }

    /// Extract every file entry of `archive` into `working_dir`.
    ///
    /// Blocking: run it inside `spawn_blocking`. Returns the number of files written.
    pub fn extract(&self, archive: &Path, working_dir: &Path) -> Result<usize, ConvertError> {
        let format = ArchiveFormat::detect(archive)?;
        debug!("Extracting {} as {:?}", archive.display(), format);

        let mut pages = 0usize;
        let mut extras = 0usize;
        let mut write_entry = |entry: ArchiveEntry| -> Result<(), ConvertError> {
            if entry.is_dir {
                return Ok(());
            }
            let Some(base_name) = entry_base_name(&entry.name) else {
                debug!("Skipping entry without a file name: {:?}", entry.name);
                return Ok(());
            };
            let is_page = FileManager::is_page_image(Path::new(base_name));
            let file_name = match self.naming {
                NamingPolicy::Sequential if is_page => sequential_name(pages, base_name),
                NamingPolicy::Sequential => format!("-{}", sequential_name(extras, base_name)),
                NamingPolicy::BaseName => base_name.to_string(),
            };
            std::fs::write(working_dir.join(&file_name), &entry.data).map_err(extraction_error)?;
            if is_page {
                pages += 1;
            } else {
                extras += 1;
            }
            Ok(())
        };

        match format {
            ArchiveFormat::Zip => Self::for_each_zip_entry(archive, &mut write_entry)?,
            ArchiveFormat::Rar => Self::for_each_rar_entry(archive, &mut write_entry)?,
        }

        let written = pages + extras;
        if written == 0 {
            return Err(ConvertError::Extraction("archive contains no files".to_string()));
        }

        info!("Extracted {} files from {}", written, archive.display());
        Ok(written)
    }

    fn for_each_zip_entry<F>(path: &Path, on_entry: &mut F) -> Result<(), ConvertError>
    where
        F: FnMut(ArchiveEntry) -> Result<(), ConvertError>,
    {
        let file = File::open(path).map_err(extraction_error)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(extraction_error)?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(extraction_error)?;
            let name = entry.name().to_string();
            let is_dir = entry.is_dir();
            let mut data = Vec::new();
            if !is_dir {
                entry.read_to_end(&mut data).map_err(extraction_error)?;
            }
            on_entry(ArchiveEntry { name, is_dir, data })?;
        }
        Ok(())
    }

    fn for_each_rar_entry<F>(path: &Path, on_entry: &mut F) -> Result<(), ConvertError>
    where
        F: FnMut(ArchiveEntry) -> Result<(), ConvertError>,
    {
        let mut archive = unrar::Archive::new(path)
            .open_for_processing()
            .map_err(extraction_error)?;

        while let Some(header) = archive.read_header().map_err(extraction_error)? {
            let name = header.entry().filename.to_string_lossy().into_owned();
            let is_dir = header.entry().is_directory();

            archive = if is_dir {
                on_entry(ArchiveEntry {
                    name,
                    is_dir,
                    data: Vec::new(),
                })?;
                header.skip().map_err(extraction_error)?
            } else {
                let (data, rest) = header.read().map_err(extraction_error)?;
                on_entry(ArchiveEntry { name, is_dir, data })?;
                rest
            };
        }
        Ok(())
    }
}

/// Last path component of an archive entry name, accepting `/` and `\` separators
fn entry_base_name(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
}

fn sequential_name(index: usize, base_name: &str) -> String {
    match Path::new(base_name).extension() {
        Some(ext) => format!("{:05}.{}", index, ext.to_string_lossy()),
        None => format!("{:05}", index),
    }
}
