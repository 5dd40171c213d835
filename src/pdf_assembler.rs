//! # PDF Assembly Module
//!
//! Questo modulo costruisce il PDF finale a partire dalle pagine JPEG.
//!
//! ## Responsabilità:
//! - Elenca i `.jpg` / `.jpeg` della working directory in ordine ordinale
//! - Per ogni immagine legge dimensioni e DPI dall'header (`JpegInfo`)
//! - Crea una pagina di `pixel * 72 / dpi` punti per lato con l'immagine a
//!   pagina piena
//! - Scrive il documento oggetto per oggetto con `PdfStreamWriter`, usando i
//!   tipi `lopdf` per dizionari e content stream
//!
//! ## Dettagli:
//! - I byte JPEG vengono inseriti così come sono (`/Filter /DCTDecode`), senza
//!   ridecodifica: la compressione fatta dallo stage precedente finisce nel PDF
//! - Le immagini sono lette e scritte a batch (default 5): in memoria restano
//!   solo i byte del batch corrente. I numeri di oggetto dipendono solo
//!   dall'indice di pagina, quindi l'output è identico per qualsiasi batch
//! - Nessun timestamp né ID casuale: stesso input, stessi byte
//! - Il file viene scritto come `<working dir>/<nome>.pdf.part` e rinominato
//!   solo a successo; in caso di errore il parziale viene eliminato

use crate::{
    error::ConvertError, file_manager::FileManager, image_info::JpegInfo,
    pdf_writer::PdfStreamWriter,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMAGE_RESOURCE: &[u8] = b"Im0";
const PAGES_ID: u32 = 1;
const CATALOG_ID: u32 = 2;

fn assembly_error(err: impl Display) -> ConvertError {
    ConvertError::Assembly(err.to_string())
}

/// Object numbers of page `index`: image, content stream, page dictionary
fn page_object_ids(index: usize) -> (u32, u32, u32) {
    let base = 3 + 3 * index as u32;
    (base, base + 1, base + 2)
}

/// Lays out one PDF page per JPEG page image
pub struct PdfAssembler {
    batch_size: usize,
    fallback_dpi: f32,
}

impl PdfAssembler {
    pub fn new(batch_size: usize, fallback_dpi: f32) -> Self {
        Self {
            batch_size: batch_size.max(1),
            fallback_dpi,
        }
    }

    /// Assemble the JPEGs of `working_dir` into `output`. Blocking.
    ///
    /// The partial file lives inside `working_dir` until it is renamed onto
    /// `output`. Returns the number of pages written.
    pub fn assemble(&self, working_dir: &Path, output: &Path) -> Result<usize, ConvertError> {
        let images = FileManager::list_jpegs(working_dir).map_err(assembly_error)?;
        if images.is_empty() {
            return Err(ConvertError::Assembly("no pages to assemble".to_string()));
        }

        let part = partial_path(working_dir, output);
        let written = self
            .write_pdf(&images, &part)
            .and_then(|()| std::fs::rename(&part, output).map_err(assembly_error));
        if let Err(e) = written {
            if let Err(cleanup) = std::fs::remove_file(&part) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial PDF {}: {}", part.display(), cleanup);
                }
            }
            return Err(e);
        }

        info!("Wrote {} ({} pages)", output.display(), images.len());
        Ok(images.len())
    }

    /// Stream pages to `part` one batch at a time; only the current batch's
    /// image bytes are held in memory.
    fn write_pdf(&self, images: &[PathBuf], part: &Path) -> Result<(), ConvertError> {
        let file = File::create(part).map_err(assembly_error)?;
        let mut writer = PdfStreamWriter::new(BufWriter::new(file)).map_err(assembly_error)?;
        let mut kids: Vec<Object> = Vec::with_capacity(images.len());

        for (batch_index, batch) in images.chunks(self.batch_size).enumerate() {
            let first = batch_index * self.batch_size;
            let pages = batch
                .iter()
                .map(|path| std::fs::read(path).map(|bytes| (path, bytes)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(assembly_error)?;

            for (offset, (image_path, bytes)) in pages.into_iter().enumerate() {
                let page_id = self.write_page(&mut writer, first + offset, image_path, bytes)?;
                kids.push(Object::Reference((page_id, 0)));
            }
            writer.flush().map_err(assembly_error)?;
            debug!("Wrote batch {} ({} pages)", batch_index + 1, batch.len());
        }

        let count = kids.len() as i64;
        writer
            .write_object(
                PAGES_ID,
                &Object::Dictionary(dictionary! {
                    "Type" => "Pages",
                    "Kids" => kids,
                    "Count" => count,
                }),
            )
            .map_err(assembly_error)?;
        writer
            .write_object(
                CATALOG_ID,
                &Object::Dictionary(dictionary! {
                    "Type" => "Catalog",
                    "Pages" => Object::Reference((PAGES_ID, 0)),
                }),
            )
            .map_err(assembly_error)?;

        writer.finish(CATALOG_ID).map_err(assembly_error)?;
        Ok(())
    }

    fn write_page<W: Write>(
        &self,
        writer: &mut PdfStreamWriter<W>,
        index: usize,
        image_path: &Path,
        bytes: Vec<u8>,
    ) -> Result<u32, ConvertError> {
        let info = JpegInfo::parse(&bytes).map_err(|e| page_error(image_path, e))?;
        let (width_pt, height_pt) = info.page_size_pt(self.fallback_dpi);
        let (image_id, content_id, page_id) = page_object_ids(index);

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => info.width as i64,
            "Height" => info.height as i64,
            "ColorSpace" => color_space(info.components).map_err(|e| page_error(image_path, e))?,
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        };
        if info.components == 4 && info.adobe {
            // Adobe writes CMYK JPEGs inverted
            let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
                .into_iter()
                .map(|v: i64| Object::Integer(v))
                .collect();
            image_dict.set("Decode", decode);
        }
        writer
            .write_stream(image_id, &image_dict, &bytes)
            .map_err(assembly_error)?;

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width_pt.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                        height_pt.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(assembly_error)?;
        writer
            .write_stream(content_id, &Dictionary::new(), &encoded)
            .map_err(assembly_error)?;

        let mut xobjects = Dictionary::new();
        xobjects.set(IMAGE_RESOURCE.to_vec(), Object::Reference((image_id, 0)));
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference((PAGES_ID, 0)),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                width_pt.into(),
                height_pt.into(),
            ],
            "Contents" => Object::Reference((content_id, 0)),
            "Resources" => dictionary! { "XObject" => xobjects },
        };
        writer
            .write_object(page_id, &Object::Dictionary(page))
            .map_err(assembly_error)?;

        Ok(page_id)
    }
}

fn color_space(components: u8) -> Result<&'static str, String> {
    match components {
        1 => Ok("DeviceGray"),
        3 => Ok("DeviceRGB"),
        4 => Ok("DeviceCMYK"),
        n => Err(format!("unsupported JPEG component count {}", n)),
    }
}

fn page_error(path: &Path, reason: impl Display) -> ConvertError {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    ConvertError::Assembly(format!("{}: {}", name, reason))
}

/// `<working_dir>/<output name>.part`: unique per source archive and on the
/// same filesystem as `output`, so the final rename is atomic
fn partial_path(working_dir: &Path, output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    working_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::jpeg_bytes;
    use lopdf::Document;
    use tempfile::TempDir;

    fn number(obj: &Object) -> f32 {
        match obj {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r as f32,
            other => panic!("not a number: {:?}", other),
        }
    }

    fn media_boxes(path: &Path) -> Vec<(f32, f32)> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|page_id| {
                let page = doc.get_object(*page_id).unwrap().as_dict().unwrap();
                let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (number(&media_box[2]), number(&media_box[3]))
            })
            .collect()
    }

    #[test]
    fn test_page_size_from_dpi() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        std::fs::write(work.join("00000.jpg"), jpeg_bytes(900, 1200, Some(300), 60)).unwrap();
        let output = temp_dir.path().join("book.pdf");

        let pages = PdfAssembler::new(5, 96.0).assemble(&work, &output).unwrap();

        assert_eq!(pages, 1);
        let boxes = media_boxes(&output);
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].0 - 216.0).abs() < 0.01);
        assert!((boxes[0].1 - 288.0).abs() < 0.01);
    }

    #[test]
    fn test_pages_follow_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        // widths 10, 20, 30 pt at 72 dpi make page order observable
        std::fs::write(work.join("00002.jpg"), jpeg_bytes(30, 8, Some(72), 80)).unwrap();
        std::fs::write(work.join("00000.jpg"), jpeg_bytes(10, 8, Some(72), 80)).unwrap();
        std::fs::write(work.join("00001.jpeg"), jpeg_bytes(20, 8, Some(72), 80)).unwrap();
        std::fs::write(work.join("00003.xml"), b"<ComicInfo/>").unwrap();
        let output = temp_dir.path().join("book.pdf");

        let pages = PdfAssembler::new(5, 96.0).assemble(&work, &output).unwrap();

        assert_eq!(pages, 3);
        let widths: Vec<f32> = media_boxes(&output).into_iter().map(|(w, _)| w).collect();
        assert_eq!(widths, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_batch_size_does_not_change_output() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        for i in 0..7 {
            std::fs::write(work.join(format!("{:05}.jpg", i)), jpeg_bytes(16 + i, 16, None, 70)).unwrap();
        }

        let single = temp_dir.path().join("single.pdf");
        let batched = temp_dir.path().join("batched.pdf");
        PdfAssembler::new(100, 96.0).assemble(&work, &single).unwrap();
        PdfAssembler::new(5, 96.0).assemble(&work, &batched).unwrap();

        assert_eq!(std::fs::read(&single).unwrap(), std::fs::read(&batched).unwrap());
        assert_eq!(media_boxes(&batched).len(), 7);
    }

    #[test]
    fn test_empty_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("book.pdf");
        let err = PdfAssembler::new(5, 96.0).assemble(temp_dir.path(), &output).unwrap_err();
        assert!(matches!(err, ConvertError::Assembly(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_corrupt_page_leaves_no_pdf() {
        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        std::fs::write(work.join("00000.jpg"), jpeg_bytes(16, 16, None, 70)).unwrap();
        std::fs::write(work.join("00001.jpg"), b"broken").unwrap();
        let output = temp_dir.path().join("book.pdf");

        let err = PdfAssembler::new(5, 96.0).assemble(&work, &output).unwrap_err();

        assert!(err.to_string().contains("00001.jpg"));
        assert!(!output.exists());
        assert!(!partial_path(&work, &output).exists());
    }

    #[test]
    fn test_partial_file_stays_in_working_dir() {
        assert_eq!(
            partial_path(Path::new("/out/.book.cbz.1a2b3c4d.work"), Path::new("/out/book.pdf")),
            PathBuf::from("/out/.book.cbz.1a2b3c4d.work/book.pdf.part")
        );

        let temp_dir = TempDir::new().unwrap();
        let work = temp_dir.path().join("work");
        std::fs::create_dir(&work).unwrap();
        std::fs::write(work.join("00000.jpg"), jpeg_bytes(16, 16, None, 70)).unwrap();
        let output = temp_dir.path().join("book.pdf");

        PdfAssembler::new(5, 96.0).assemble(&work, &output).unwrap();

        assert!(output.exists());
        assert!(!temp_dir.path().join("book.pdf.part").exists());
        assert!(!partial_path(&work, &output).exists());
    }

    #[test]
    fn test_object_numbers_depend_only_on_page_index() {
        assert_eq!(page_object_ids(0), (3, 4, 5));
        assert_eq!(page_object_ids(5), (18, 19, 20));
    }
}
