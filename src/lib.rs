//! # Comic to PDF Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione esplicita della pipeline e validazione
//! - `error`: Tipi di errore per ogni stage della conversione
//! - `file_manager`: Discovery degli archivi e listing delle pagine
//! - `archive_extractor`: Estrazione di CBZ (zip) e CBR (rar)
//! - `page_selector`: Rimozione opzionale dell'ultima pagina
//! - `image_info`: Lettura di dimensioni e DPI dagli header JPEG
//! - `image_compressor`: Ricompressione JPEG
//! - `pdf_assembler`: Un'immagine per pagina nel PDF finale
//! - `pdf_writer`: Scrittura incrementale degli oggetti PDF
//! - `converter`: Pipeline per archivio e orchestratore del batch
//! - `progress` / `events` / `json_output`: Report e notifiche verso la UI
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use comic_to_pdf::{BatchCoordinator, Config, NullSink};
//! use std::{path::Path, sync::Arc};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut coordinator = BatchCoordinator::new(Path::new("/comics"), Config::default(), Arc::new(NullSink))?;
//! let report = coordinator.run().await?;
//! println!("{}", report.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod archive_extractor;
pub mod config;
pub mod converter;
pub mod error;
pub mod events;
pub mod file_manager;
pub mod image_compressor;
pub mod image_info;
pub mod json_output;
pub mod page_selector;
pub mod pdf_assembler;
pub mod pdf_writer;
pub mod progress;

#[cfg(test)]
mod test_support;

pub use config::{Config, NamingPolicy, PageSelection};
pub use converter::{BatchCoordinator, ConversionPipeline, Outcome, Stage};
pub use error::ConvertError;
pub use events::{EventSink, JsonSink, NullSink, ProgressBarSink, RecordingSink};
pub use progress::{BatchReport, Failure, FailureLog};
