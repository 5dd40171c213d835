//! # Image Compression Module
//!
//! Questo modulo ricomprime le pagine JPEG della working directory.
//!
//! ## Responsabilità:
//! - Trova tutti i file `.jpg` / `.jpeg` (case-insensitive)
//! - Decodifica e ricodifica ogni immagine con il codec JPEG di `image`
//!   alla qualità configurata (default 40)
//! - Sovrascrive il file originale con i byte ricodificati
//!
//! ## Invarianti:
//! - Le dimensioni in pixel non cambiano (nessun resize)
//! - La densità JFIF dell'originale viene riportata nel nuovo file: il
//!   `PdfAssembler` calcola la dimensione della pagina da quei DPI
//! - Le immagini in scala di grigi restano in scala di grigi
//!
//! ## Errori:
//! Il primo errore su una qualsiasi immagine interrompe lo stage con
//! `ConvertError::Compression`. Le immagini già riscritte restano su disco:
//! la working directory viene comunque eliminata dalla pipeline.

use crate::{
    error::ConvertError,
    file_manager::FileManager,
    image_info::{Density, DensityUnit, JpegInfo},
};
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::ColorType;
use std::path::Path;
use tracing::debug;

/// Byte totals for one compression pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {
    pub images: usize,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

impl CompressionStats {
    pub fn bytes_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compressed_bytes)
    }
}

/// Re-encodes JPEG pages at a fixed quality
pub struct ImageCompressor {
    quality: u8,
}

impl ImageCompressor {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    /// Recompress every JPEG in `working_dir` in place. Blocking.
    pub fn compress_dir(&self, working_dir: &Path) -> Result<CompressionStats, ConvertError> {
        let images = FileManager::list_jpegs(working_dir)
            .map_err(|e| ConvertError::Compression(e.to_string()))?;
        let mut stats = CompressionStats::default();

        for image_path in images {
            let original = std::fs::read(&image_path)
                .map_err(|e| Self::image_error(&image_path, e))?;
            let compressed = self.recompress(&original).map_err(|e| match e {
                ConvertError::Compression(reason) => Self::image_error(&image_path, reason),
                other => other,
            })?;
            std::fs::write(&image_path, &compressed)
                .map_err(|e| Self::image_error(&image_path, e))?;

            debug!(
                "Recompressed {}: {} -> {}",
                image_path.display(),
                FileManager::format_size(original.len() as u64),
                FileManager::format_size(compressed.len() as u64)
            );

            stats.images += 1;
            stats.original_bytes += original.len() as u64;
            stats.compressed_bytes += compressed.len() as u64;
        }

        Ok(stats)
    }

    /// Decode `bytes` and encode them again as JPEG at the configured quality
    pub fn recompress(&self, bytes: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let density = JpegInfo::parse(bytes).ok().and_then(|info| info.density);
        let img = image::load_from_memory(bytes)
            .map_err(|e| ConvertError::Compression(e.to_string()))?;

        let mut out = Vec::with_capacity(bytes.len());
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            if let Some(density) = density {
                encoder.set_pixel_density(pixel_density(density));
            }

            let result = match img.color() {
                ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
                    let gray = img.to_luma8();
                    encoder.encode(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)
                }
                _ => {
                    let rgb = img.to_rgb8();
                    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                }
            };
            result.map_err(|e| ConvertError::Compression(e.to_string()))?;
        }

        Ok(out)
    }

    fn image_error(path: &Path, reason: impl std::fmt::Display) -> ConvertError {
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        ConvertError::Compression(format!("{}: {}", name, reason))
    }
}

fn pixel_density(density: Density) -> PixelDensity {
    PixelDensity {
        density: (density.x, density.y),
        unit: match density.unit {
            DensityUnit::Inches => PixelDensityUnit::Inches,
            DensityUnit::Centimeters => PixelDensityUnit::Centimeters,
        },
    }
}
