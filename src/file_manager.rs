//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la discovery degli archivi.
//!
//! ## Responsabilità:
//! - Discovery (non ricorsiva) di archivi CBR/CBZ nella directory target
//! - Determinazione del tipo di file (archivio vs pagina JPEG)
//! - Elenco ordinato dei file di una working directory
//! - Formattazione human-readable delle dimensioni
//!
//! ## Ordinamento:
//! Tutti gli elenchi sono ordinati per nome file con confronto ordinale
//! (byte per byte, case-sensitive): è l'ordine che definisce le pagine.
//!
//! ## Esempio:
//! ```rust,no_run
//! use comic_to_pdf::file_manager::FileManager;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let archives = FileManager::find_archives(Path::new("/comics"))?;
//! let pages = FileManager::list_jpegs(Path::new("/comics/.book.cbz.1a2b3c4d.work"))?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find all CBR/CBZ archives directly inside `dir`, sorted by name
    pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if Self::is_archive(path) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Check if a file is a comic archive (`.cbr` / `.cbz`, any case)
    pub fn is_archive(path: &Path) -> bool {
        Self::has_extension(path, &["cbr", "cbz"])
    }

    /// Check if a file is a JPEG page (`.jpg` / `.jpeg`, any case)
    pub fn is_jpeg(path: &Path) -> bool {
        Self::has_extension(path, &["jpg", "jpeg"])
    }

    /// Check if a file is a page image of any common format
    pub fn is_page_image(path: &Path) -> bool {
        Self::has_extension(
            path,
            &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"],
        )
    }

    fn has_extension(path: &Path, extensions: &[&str]) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.contains(&ext_lower.as_str())
        } else {
            false
        }
    }

    /// List every regular file in `dir`, ordered by name
    pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// List the JPEG files in `dir`, ordered by name
    pub fn list_jpegs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        Ok(Self::list_files(dir)?
            .into_iter()
            .filter(|path| Self::is_jpeg(path))
            .collect())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_archives_is_flat_and_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::write(root.join("b.CBZ"), b"x").unwrap();
        std::fs::write(root.join("a.cbr"), b"x").unwrap();
        std::fs::write(root.join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join("c.cbz"), b"x").unwrap();

        let found = FileManager::find_archives(root).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.cbr", "b.CBZ"]);
    }

    #[test]
    fn test_list_jpegs_sorted_ordinal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["b.jpg", "B.JPEG", "a.jpeg", "cover.png", "info.xml"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }

        let jpegs = FileManager::list_jpegs(root).unwrap();
        let names: Vec<_> = jpegs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        // uppercase sorts before lowercase in ordinal order
        assert_eq!(names, vec!["B.JPEG", "a.jpeg", "b.jpg"]);
    }

    #[test]
    fn test_is_page_image() {
        assert!(FileManager::is_page_image(Path::new("p.JPG")));
        assert!(FileManager::is_page_image(Path::new("cover.png")));
        assert!(!FileManager::is_page_image(Path::new("ComicInfo.xml")));
        assert!(!FileManager::is_page_image(Path::new("README")));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 0), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
    }
}
