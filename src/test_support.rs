//! Fixture builders shared by the unit tests

use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::ColorType;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Encode a textured RGB JPEG of the given size at `quality`
pub fn jpeg_bytes(width: u32, height: u32, dpi: Option<u16>, quality: u8) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let noise = ((x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 97) as u8;
            pixels.push((x % 256) as u8 ^ noise);
            pixels.push((y % 256) as u8);
            pixels.push(((x + y) % 256) as u8 ^ (noise << 1));
        }
    }

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    if let Some(dpi) = dpi {
        encoder.set_pixel_density(PixelDensity::dpi(dpi));
    }
    encoder
        .encode(&pixels, width, height, ColorType::Rgb8)
        .expect("encode fixture jpeg");
    out
}

/// Build an in-memory ZIP; names ending in `/` become directory entries
pub fn build_zip(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(data).expect("write entry");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}
