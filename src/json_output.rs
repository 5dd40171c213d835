//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da parte di
//! un'interfaccia esterna (GUI, script).
//!
//! ## Tipi di messaggi (uno per riga su stdout):
//! - `start`: inizio batch con directory e numero di archivi
//! - `progress`: percentuale corrente (0-100)
//! - `log`: riga leggibile per ogni archivio completato o fallito
//! - `complete`: report finale con FailureLog

use crate::progress::{BatchReport, Failure};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio del batch
    Start {
        target_dir: PathBuf,
        total_files: usize,
    },

    /// Progresso corrente
    Progress { percent: u8 },

    /// Riga di log
    Log { line: String },

    /// Batch completato
    Complete {
        total: usize,
        succeeded: usize,
        failed: usize,
        pages_written: usize,
        bytes_saved: u64,
        duration_seconds: f64,
        failures: Vec<JsonFailure>,
    },
}

/// Voce del FailureLog in forma serializzabile
#[derive(Debug, Serialize)]
pub struct JsonFailure {
    pub path: PathBuf,
    #[serde(flatten)]
    pub failure: Failure,
}

impl JsonMessage {
    /// Serializza il messaggio in una riga JSON
    pub fn to_line(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Some(json) = self.to_line() {
            println!("{}", json);
        }
    }

    pub fn start(target_dir: PathBuf, total_files: usize) -> Self {
        Self::Start {
            target_dir,
            total_files,
        }
    }

    pub fn progress(percent: u8) -> Self {
        Self::Progress { percent }
    }

    pub fn log(line: &str) -> Self {
        Self::Log {
            line: line.to_string(),
        }
    }

    pub fn complete(report: &BatchReport) -> Self {
        Self::Complete {
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed(),
            pages_written: report.pages_written,
            bytes_saved: report.bytes_saved(),
            duration_seconds: report.duration_seconds,
            failures: report
                .failures
                .iter()
                .map(|(path, failure)| JsonFailure {
                    path: path.clone(),
                    failure: failure.clone(),
                })
                .collect(),
        }
    }
}
