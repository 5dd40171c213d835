//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della pipeline di conversione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` per categorizzare gli errori di ogni stage
//! - Fornisce messaggi leggibili che finiscono nel FailureLog
//! - Integra con `thiserror` per la conversione automatica da `std::io::Error`
//!
//! ## Categorie di errori:
//! - `Extraction`: archivio illeggibile, corrotto o formato non supportato
//! - `Compression`: decode/encode di un'immagine fallito
//! - `Assembly`: lettura metadata immagine o scrittura PDF fallita
//! - `Cancelled`: stop richiesto prima di entrare in uno stage
//! - `Io`: errori di I/O fuori dagli stage (working directory, scan)
//! - `Config`: parametri di configurazione non validi
//!
//! ## Esempio:
//! ```rust
//! # use comic_to_pdf::ConvertError;
//! fn detect(magic: &[u8]) -> Result<(), ConvertError> {
//!     if !magic.starts_with(b"PK") {
//!         return Err(ConvertError::Extraction("unsupported archive format".to_string()));
//!     }
//!     Ok(())
//! }
//! assert!(detect(b"GIF89a").is_err());
//! ```

/// Errors produced while converting a single archive
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("ExtractionError: {0}")]
    Extraction(String),

    #[error("CompressionError: {0}")]
    Compression(String),

    #[error("AssemblyError: {0}")]
    Assembly(String),

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ConvertError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction",
            Self::Compression(_) => "compression",
            Self::Assembly(_) => "assembly",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
            Self::Config(_) => "config",
        }
    }
}
