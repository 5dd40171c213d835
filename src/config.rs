//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione della conversione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio da/verso file JSON (usato solo dalla CLI,
//!   il core riceve sempre un `Config` esplicito)
//!
//! ## Parametri di configurazione:
//! - `jpeg_quality`: Qualità di ricompressione JPEG (1-100, default: 40)
//! - `page_selection`: `KeepAll` o `DropLast` (default: KeepAll)
//! - `naming`: Nomi dei file estratti, sequenziali o base name (default: Sequential)
//! - `pdf_batch_size`: Immagini per batch durante l'assemblaggio (default: 5)
//! - `fallback_dpi`: DPI usati quando il JPEG non dichiara una densità (default: 96)
//! - `max_concurrent`: Limite di pipeline concorrenti (default: None = nessun limite)
//! - `json_output`: Eventi in formato JSON lines (default: false)
//!
//! ## Esempio:
//! ```rust
//! # use comic_to_pdf::{Config, PageSelection};
//! # fn main() -> anyhow::Result<()> {
//! let config = Config {
//!     page_selection: PageSelection::DropLast,
//!     ..Default::default()
//! };
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::ConvertError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Page-selection policy applied after extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSelection {
    /// Keep every extracted file
    #[default]
    KeepAll,
    /// Delete the file whose name sorts last
    DropLast,
}

/// How extracted entries are named inside the working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Zero-padded sequence number in archive order, original extension kept
    #[default]
    Sequential,
    /// Entry base name, later entries overwrite earlier ones on collision
    BaseName,
}

/// Configuration for a conversion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG re-encoding quality (1-100)
    pub jpeg_quality: u8,
    /// Page-selection policy
    pub page_selection: PageSelection,
    /// Naming of extracted pages
    pub naming: NamingPolicy,
    /// Number of images handled per assembly batch
    pub pdf_batch_size: usize,
    /// DPI assumed for images without an absolute JFIF density
    pub fallback_dpi: f32,
    /// Upper bound on concurrently running pipelines (None = unbounded)
    pub max_concurrent: Option<usize>,
    /// Output progress and status as JSON lines
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jpeg_quality: 40,
            page_selection: PageSelection::KeepAll,
            naming: NamingPolicy::Sequential,
            pdf_batch_size: 5,
            fallback_dpi: 96.0,
            max_concurrent: None,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConvertError::Config("JPEG quality must be between 1 and 100".to_string()));
        }

        if self.pdf_batch_size == 0 {
            return Err(ConvertError::Config("PDF batch size must be greater than 0".to_string()));
        }

        if !self.fallback_dpi.is_finite() || self.fallback_dpi <= 0.0 {
            return Err(ConvertError::Config("Fallback DPI must be a positive number".to_string()));
        }

        if self.max_concurrent == Some(0) {
            return Err(ConvertError::Config("Number of workers must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Load configuration from file, falling back to defaults when it does not exist
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Default location of the CLI settings file
    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cbx2pdf").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 101;
        assert!(config.validate().is_err());

        config.jpeg_quality = 40;
        config.pdf_batch_size = 0;
        assert!(config.validate().is_err());

        config.pdf_batch_size = 5;
        config.fallback_dpi = 0.0;
        assert!(config.validate().is_err());

        config.fallback_dpi = 72.0;
        config.max_concurrent = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.jpeg_quality, 40);
        assert_eq!(config.page_selection, PageSelection::KeepAll);
        assert_eq!(config.naming, NamingPolicy::Sequential);
        assert_eq!(config.pdf_batch_size, 5);
        assert_eq!(config.fallback_dpi, 96.0);
        assert!(config.max_concurrent.is_none());
        assert!(!config.json_output);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            jpeg_quality: 55,
            page_selection: PageSelection::DropLast,
            max_concurrent: Some(2),
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.jpeg_quality, 55);
        assert_eq!(loaded_config.page_selection, PageSelection::DropLast);
        assert_eq!(loaded_config.max_concurrent, Some(2));
        assert_eq!(loaded_config.naming, NamingPolicy::Sequential);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config.jpeg_quality, 40);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"page_selection":"drop_last"}"#).unwrap();
        assert_eq!(config.page_selection, PageSelection::DropLast);
        assert_eq!(config.pdf_batch_size, 5);
    }
}
