//! # Progress Tracking and Statistics Module
//!
//! Questo modulo contiene la barra di progresso e i tipi del report finale.
//!
//! ## Componenti principali:
//! - `ProgressManager`: progress bar `indicatif` in percentuale (0-100)
//! - `FailureLog`: mappa archivio → (stage, motivo), azzerata a ogni batch
//! - `BatchReport`: riepilogo di un batch (file, pagine, byte risparmiati, errori)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 60% Success: /comics/book1.cbz (24 pages)
//! ```

use crate::converter::pipeline::Stage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Manages the terminal progress bar for a batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a progress bar measured in percent
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Move the bar to `percent`
    pub fn set_percent(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    /// Set a custom message without moving the bar
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Print a line above the bar
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Why and where a single archive failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub reason: String,
}

/// Failed archives of one batch, keyed by source path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureLog {
    entries: BTreeMap<PathBuf, Failure>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record a failure; the first entry for a path wins
    pub fn record(&mut self, source: PathBuf, failure: Failure) {
        self.entries.entry(source).or_insert(failure);
    }

    pub fn get(&self, source: &Path) -> Option<&Failure> {
        self.entries.get(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Failure)> {
        self.entries.iter()
    }
}

/// Summary of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub pages_written: usize,
    pub original_image_bytes: u64,
    pub compressed_image_bytes: u64,
    pub failures: FailureLog,
    pub duration_seconds: f64,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn bytes_saved(&self) -> u64 {
        self.original_image_bytes.saturating_sub(self.compressed_image_bytes)
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        crate::file_manager::FileManager::calculate_reduction(
            self.original_image_bytes,
            self.compressed_image_bytes,
        )
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Converted: {}/{} archives | Pages: {} | Failed: {} | Images saved: {} ({:.2}%)",
            self.succeeded,
            self.total,
            self.pages_written,
            self.failed(),
            crate::file_manager::FileManager::format_size(self.bytes_saved()),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_log_first_entry_wins() {
        let mut log = FailureLog::new();
        let source = PathBuf::from("/comics/book2.cbr");
        log.record(
            source.clone(),
            Failure {
                stage: Stage::Extract,
                reason: "first".to_string(),
            },
        );
        log.record(
            source.clone(),
            Failure {
                stage: Stage::Assemble,
                reason: "second".to_string(),
            },
        );

        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&source).unwrap().reason, "first");

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_report_summary() {
        let report = BatchReport {
            total: 2,
            succeeded: 1,
            pages_written: 3,
            original_image_bytes: 2048,
            compressed_image_bytes: 1024,
            ..Default::default()
        };
        assert_eq!(report.bytes_saved(), 1024);
        assert_eq!(report.overall_reduction_percent(), 50.0);
        assert!(report.format_summary().starts_with("Converted: 1/2 archives"));
    }
}
