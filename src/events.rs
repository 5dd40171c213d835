//! # Event Sinks
//!
//! Il core non conosce la UI: pubblica progresso e righe di log tramite il
//! trait `EventSink`. Questo modulo fornisce le implementazioni usate dalla
//! CLI (barra di progresso, JSON lines) e quelle per chi incorpora la libreria.

use crate::{json_output::JsonMessage, progress::BatchReport, progress::ProgressManager};
use std::path::Path;
use std::sync::Mutex;

/// Receives batch notifications from the coordinator
pub trait EventSink: Send + Sync {
    /// Batch progress in percent, non-decreasing within one run
    fn on_progress(&self, percent: u8);

    /// One human-readable line per completed or failed archive
    fn on_log(&self, line: &str);

    /// Called once before any archive is converted
    fn on_start(&self, _target_dir: &Path, _total_files: usize) {}

    /// Called once after every archive has terminated
    fn on_complete(&self, _report: &BatchReport) {}
}

/// Discards every event
pub struct NullSink;

impl EventSink for NullSink {
    fn on_progress(&self, _percent: u8) {}
    fn on_log(&self, _line: &str) {}
}

/// Event captured by `RecordingSink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Progress(u8),
    Log(String),
}

/// Keeps every event in memory, in arrival order
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn progress(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Progress(p) => Some(p),
                RecordedEvent::Log(_) => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Log(line) => Some(line),
                RecordedEvent::Progress(_) => None,
            })
            .collect()
    }

    fn push(&self, event: RecordedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl EventSink for RecordingSink {
    fn on_progress(&self, percent: u8) {
        self.push(RecordedEvent::Progress(percent));
    }

    fn on_log(&self, line: &str) {
        self.push(RecordedEvent::Log(line.to_string()));
    }
}

/// Terminal progress bar with log lines printed above it
pub struct ProgressBarSink {
    progress: ProgressManager,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        Self {
            progress: ProgressManager::new(),
        }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressBarSink {
    fn on_progress(&self, percent: u8) {
        self.progress.set_percent(percent);
    }

    fn on_log(&self, line: &str) {
        self.progress.println(line);
        self.progress.set_message(line);
    }

    fn on_start(&self, target_dir: &Path, total_files: usize) {
        self.progress
            .set_message(&format!("{} archives in {}", total_files, target_dir.display()));
    }

    fn on_complete(&self, report: &BatchReport) {
        self.progress.finish(&report.format_summary());
    }
}

/// JSON lines on stdout, one message per event
pub struct JsonSink;

impl EventSink for JsonSink {
    fn on_progress(&self, percent: u8) {
        JsonMessage::progress(percent).emit();
    }

    fn on_log(&self, line: &str) {
        JsonMessage::log(line).emit();
    }

    fn on_start(&self, target_dir: &Path, total_files: usize) {
        JsonMessage::start(target_dir.to_path_buf(), total_files).emit();
    }

    fn on_complete(&self, report: &BatchReport) {
        JsonMessage::complete(report).emit();
    }
}
