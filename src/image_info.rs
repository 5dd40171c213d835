//! # JPEG Header Inspection
//!
//! Legge dall'header di un JPEG le informazioni necessarie a compressore e
//! assembler senza decodificare i pixel:
//! - dimensioni in pixel e numero di componenti (segmento SOF)
//! - densità JFIF (segmento APP0), da cui si ricavano i DPI
//! - presenza del marker Adobe (APP14), rilevante per JPEG CMYK
//!
//! Le densità espresse solo come aspect ratio (unità 0) non danno DPI assoluti:
//! in quel caso il chiamante usa un valore di fallback.

/// Absolute pixel density declared by a JFIF header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Density {
    pub x: u16,
    pub y: u16,
    pub unit: DensityUnit,
}

/// Unit of a JFIF density
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityUnit {
    Inches,
    Centimeters,
}

impl Density {
    /// Horizontal density in dots per inch
    pub fn horizontal_dpi(&self) -> f32 {
        match self.unit {
            DensityUnit::Inches => self.x as f32,
            DensityUnit::Centimeters => self.x as f32 * 2.54,
        }
    }
}

/// Header facts about a baseline or progressive JPEG
#[derive(Debug, Clone, PartialEq)]
pub struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub density: Option<Density>,
    pub adobe: bool,
}

impl JpegInfo {
    /// Parse the marker segments up to the first frame header
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
            return Err("not a JPEG file (missing SOI marker)".to_string());
        }

        let mut density = None;
        let mut adobe = false;
        let mut pos = 2;

        loop {
            if pos >= bytes.len() || bytes[pos] != 0xFF {
                return Err(format!("corrupt JPEG marker at offset {}", pos));
            }
            while pos < bytes.len() && bytes[pos] == 0xFF {
                pos += 1;
            }
            let marker = *bytes
                .get(pos)
                .ok_or_else(|| "truncated JPEG header".to_string())?;
            pos += 1;

            match marker {
                // standalone markers carry no length
                0x01 | 0xD0..=0xD7 => continue,
                0xD9 | 0xDA => return Err("JPEG has no frame header".to_string()),
                _ => {}
            }

            if pos + 2 > bytes.len() {
                return Err("truncated JPEG segment length".to_string());
            }
            let length = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
            if length < 2 || pos + length > bytes.len() {
                return Err(format!("JPEG segment 0x{:02X} overruns the file", marker));
            }
            let segment = &bytes[pos + 2..pos + length];

            match marker {
                0xE0 => {
                    if density.is_none() {
                        density = parse_jfif_density(segment);
                    }
                }
                0xEE => {
                    if segment.starts_with(b"Adobe") {
                        adobe = true;
                    }
                }
                0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                    if segment.len() < 6 {
                        return Err("truncated JPEG frame header".to_string());
                    }
                    let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
                    let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
                    let components = segment[5];
                    if width == 0 || height == 0 {
                        return Err(format!("invalid JPEG dimensions {}x{}", width, height));
                    }
                    return Ok(Self {
                        width,
                        height,
                        components,
                        density,
                        adobe,
                    });
                }
                _ => {}
            }

            pos += length;
        }
    }

    /// Horizontal resolution, or `fallback_dpi` when the file declares none
    pub fn horizontal_dpi(&self, fallback_dpi: f32) -> f32 {
        self.density
            .map(|d| d.horizontal_dpi())
            .filter(|dpi| *dpi > 0.0)
            .unwrap_or(fallback_dpi)
    }

    /// Physical page size in PDF points: `pixels * 72 / horizontal_dpi` on both axes
    pub fn page_size_pt(&self, fallback_dpi: f32) -> (f32, f32) {
        let dpi = self.horizontal_dpi(fallback_dpi);
        (
            self.width as f32 * 72.0 / dpi,
            self.height as f32 * 72.0 / dpi,
        )
    }
}

fn parse_jfif_density(segment: &[u8]) -> Option<Density> {
    if segment.len() < 12 || !segment.starts_with(b"JFIF\0") {
        return None;
    }
    let unit = match segment[7] {
        1 => DensityUnit::Inches,
        2 => DensityUnit::Centimeters,
        _ => return None,
    };
    let x = u16::from_be_bytes([segment[8], segment[9]]);
    let y = u16::from_be_bytes([segment[10], segment[11]]);
    if x == 0 || y == 0 {
        return None;
    }
    Some(Density { x, y, unit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};
    use image::ColorType;

    fn encode(width: u32, height: u32, density: Option<PixelDensity>) -> Vec<u8> {
        let pixels = vec![128u8; (width * height * 3) as usize];
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 80);
        if let Some(density) = density {
            encoder.set_pixel_density(density);
        }
        encoder.encode(&pixels, width, height, ColorType::Rgb8).unwrap();
        out
    }

    #[test]
    fn test_reads_dimensions_and_density() {
        let bytes = encode(90, 120, Some(PixelDensity::dpi(300)));
        let info = JpegInfo::parse(&bytes).unwrap();
        assert_eq!((info.width, info.height), (90, 120));
        assert_eq!(info.components, 3);
        assert_eq!(info.horizontal_dpi(96.0), 300.0);
    }

    #[test]
    fn test_page_size_at_300_dpi() {
        let info = JpegInfo {
            width: 900,
            height: 1200,
            components: 3,
            density: Some(Density {
                x: 300,
                y: 300,
                unit: DensityUnit::Inches,
            }),
            adobe: false,
        };
        assert_eq!(info.page_size_pt(96.0), (216.0, 288.0));
    }

    #[test]
    fn test_aspect_ratio_density_uses_fallback() {
        let bytes = encode(16, 16, None);
        let info = JpegInfo::parse(&bytes).unwrap();
        assert!(info.density.is_none());
        assert_eq!(info.horizontal_dpi(72.0), 72.0);
        assert_eq!(info.page_size_pt(72.0), (16.0, 16.0));
    }

    #[test]
    fn test_centimeter_density() {
        let density = Density {
            x: 100,
            y: 100,
            unit: DensityUnit::Centimeters,
        };
        assert!((density.horizontal_dpi() - 254.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(JpegInfo::parse(b"not a jpeg at all").is_err());
        assert!(JpegInfo::parse(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]).is_err());
        assert!(JpegInfo::parse(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
    }
}
