//! # Progress Tracking Module
//!
//! Aggregatore unico del batch: riceve un `FileCompletion` per ogni archivio
//! terminato, aggiorna contatori e FailureLog e pubblica percentuale e riga di
//! log sull'`EventSink`. Non è condiviso tra task: lo possiede il loop del
//! coordinator, quindi niente lock.

use crate::{
    converter::pipeline::{Outcome, Stage},
    events::EventSink,
    progress::{BatchReport, Failure, FailureLog},
};
use std::path::PathBuf;

/// Message sent by a per-file task when its pipeline terminates
#[derive(Debug, Clone)]
pub struct FileCompletion {
    pub source: PathBuf,
    pub outcome: Outcome,
}

/// `ceil(completed * 100 / total)`, clamped to 100. An empty batch is complete.
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (completed.min(total) * 100).div_ceil(total);
    percent.min(100) as u8
}

/// Counters and failure log of the running batch
#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: usize,
    completed: usize,
    succeeded: usize,
    pages_written: usize,
    original_image_bytes: u64,
    compressed_image_bytes: u64,
    failures: FailureLog,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn percent(&self) -> u8 {
        progress_percent(self.completed, self.total)
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Count one terminated archive and notify the sink
    pub fn record(&mut self, completion: FileCompletion, sink: &dyn EventSink) {
        let FileCompletion { source, outcome } = completion;
        self.completed += 1;

        let line = match outcome {
            Outcome::Success {
                pages, compression, ..
            } => {
                self.succeeded += 1;
                self.pages_written += pages;
                self.original_image_bytes += compression.original_bytes;
                self.compressed_image_bytes += compression.compressed_bytes;
                format!("Success: {} ({} pages)", source.display(), pages)
            }
            Outcome::Failed { stage, reason } => {
                let line = format!("Failed [{}]: {} - {}", stage, source.display(), reason);
                self.failures.record(source, Failure { stage, reason });
                line
            }
        };

        sink.on_log(&line);
        sink.on_progress(self.percent());
    }

    /// Count a task that ended without reporting (panicked or aborted)
    pub fn record_aborted(&mut self, source: PathBuf, reason: String, sink: &dyn EventSink) {
        self.record(
            FileCompletion {
                source,
                outcome: Outcome::Failed {
                    stage: Stage::Extract,
                    reason: format!("conversion task aborted: {}", reason),
                },
            },
            sink,
        );
    }

    pub fn into_report(self, duration_seconds: f64) -> BatchReport {
        BatchReport {
            total: self.total,
            succeeded: self.succeeded,
            pages_written: self.pages_written,
            original_image_bytes: self.original_image_bytes,
            compressed_image_bytes: self.compressed_image_bytes,
            failures: self.failures,
            duration_seconds,
        }
    }
}
