//! # Batch Coordinator
//!
//! Orchestratore del batch: trova gli archivi nella directory, lancia una
//! pipeline per archivio e aggrega i risultati.
//!
//! Ogni task invia un `FileCompletion` su un canale `mpsc`; il loop di `run`
//! è l'unico proprietario di contatore e FailureLog.

use crate::{
    config::Config,
    converter::{
        pipeline::{ConversionPipeline, Outcome, Stage},
        progress_tracker::{FileCompletion, ProgressTracker},
    },
    events::EventSink,
    file_manager::FileManager,
    progress::{BatchReport, FailureLog},
};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tracing::{debug, error, info};

/// Converts every archive of one directory
pub struct BatchCoordinator {
    target_dir: PathBuf,
    config: Config,
    sink: Arc<dyn EventSink>,
    stop_sender: broadcast::Sender<()>,
    semaphore: Option<Arc<Semaphore>>,
    failure_log: FailureLog,
}

impl BatchCoordinator {
    pub fn new(target_dir: &Path, config: Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        let (stop_sender, _) = broadcast::channel(1);
        let semaphore = config.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            target_dir: target_dir.to_path_buf(),
            config,
            sink,
            stop_sender,
            semaphore,
            failure_log: FailureLog::new(),
        })
    }

    /// Sender for the stop signal. Pipelines of a running batch check it
    /// before each stage; a stop sent while no batch is running is discarded.
    pub fn stop_sender(&self) -> broadcast::Sender<()> {
        self.stop_sender.clone()
    }

    /// Failures of the last completed run
    pub fn failure_log(&self) -> &FailureLog {
        &self.failure_log
    }

    /// Convert every `.cbr`/`.cbz` directly inside the target directory
    pub async fn run(&mut self) -> Result<BatchReport> {
        if !self.target_dir.exists() {
            return Err(anyhow::anyhow!(
                "Target directory does not exist: {}",
                self.target_dir.display()
            ));
        }
        if !self.target_dir.is_dir() {
            return Err(anyhow::anyhow!(
                "Target path is not a directory: {}",
                self.target_dir.display()
            ));
        }

        let files = FileManager::find_archives(&self.target_dir)?;
        info!(
            "Found {} archives to convert in {}",
            files.len(),
            self.target_dir.display()
        );
        self.run_files(files).await
    }

    /// Convert the given archives concurrently, writing PDFs to the target directory
    pub async fn run_files(&mut self, files: Vec<PathBuf>) -> Result<BatchReport> {
        let start_time = Instant::now();
        let total = files.len();
        self.failure_log.clear();

        // Subscribe every pipeline before announcing the batch so a stop sent
        // from `on_start` onward reaches all of them
        let mut pipelines = Vec::with_capacity(total);
        let mut rejected = Vec::new();
        for source in files {
            match ConversionPipeline::new(self.config.clone(), source.clone(), &self.target_dir) {
                Ok(pipeline) => {
                    pipelines.push((source, pipeline.with_cancellation(self.stop_sender.subscribe())))
                }
                Err(e) => rejected.push(FileCompletion {
                    source,
                    outcome: Outcome::Failed {
                        stage: Stage::Extract,
                        reason: e.to_string(),
                    },
                }),
            }
        }

        self.sink.on_start(&self.target_dir, total);
        self.sink.on_progress(0);

        let mut tracker = ProgressTracker::new(total);
        if total == 0 {
            info!("No archives found to convert");
            self.sink.on_progress(100);
            return Ok(self.finish(tracker, start_time));
        }

        self.log_configuration();

        for completion in rejected {
            tracker.record(completion, self.sink.as_ref());
        }

        let (completion_sender, mut completion_receiver) = mpsc::unbounded_channel::<FileCompletion>();
        let mut tasks = Vec::with_capacity(pipelines.len());

        for (source, mut pipeline) in pipelines {
            let sender = completion_sender.clone();
            let semaphore = self.semaphore.clone();
            let task_source = source.clone();

            let task = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = pipeline.run().await;
                if sender
                    .send(FileCompletion {
                        source: task_source,
                        outcome,
                    })
                    .is_err()
                {
                    debug!("Completion receiver dropped");
                }
            });

            tasks.push((source, task));
        }
        drop(completion_sender);

        let mut reported = HashSet::new();
        while let Some(completion) = completion_receiver.recv().await {
            reported.insert(completion.source.clone());
            tracker.record(completion, self.sink.as_ref());
        }

        let (sources, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = futures::future::join_all(handles).await;
        for (source, result) in sources.into_iter().zip(results) {
            if let Err(join_err) = result {
                if !reported.contains(&source) {
                    error!("Conversion task for {} failed: {}", source.display(), join_err);
                    tracker.record_aborted(source, join_err.to_string(), self.sink.as_ref());
                }
            }
        }

        Ok(self.finish(tracker, start_time))
    }

    fn finish(&mut self, tracker: ProgressTracker, start_time: Instant) -> BatchReport {
        let report = tracker.into_report(start_time.elapsed().as_secs_f64());
        info!(
            "Batch finished: {}/{} converted, {} failed in {:.2}s",
            report.succeeded,
            report.total,
            report.failed(),
            report.duration_seconds
        );
        self.failure_log = report.failures.clone();
        self.sink.on_complete(&report);
        report
    }

    fn log_configuration(&self) {
        debug!("JPEG quality: {}", self.config.jpeg_quality);
        debug!("Page selection: {:?}", self.config.page_selection);
        debug!("Page naming: {:?}", self.config.naming);
        match self.config.max_concurrent {
            Some(limit) => debug!("Concurrency: at most {} archives at a time", limit),
            None => debug!("Concurrency: all archives at once"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NullSink, RecordingSink};
    use crate::test_support::{build_zip, jpeg_bytes};
    use crate::error::ConvertError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Requests a stop as soon as the batch is announced
    #[derive(Default)]
    struct StopOnStart {
        stop_sender: Mutex<Option<broadcast::Sender<()>>>,
    }

    impl EventSink for StopOnStart {
        fn on_progress(&self, _percent: u8) {}
        fn on_log(&self, _line: &str) {}

        fn on_start(&self, _target_dir: &Path, _total_files: usize) {
            if let Some(sender) = self.stop_sender.lock().unwrap().as_ref() {
                sender.send(()).unwrap();
            }
        }
    }

    fn write_book(dir: &Path, name: &str, pages: u32) {
        let entries: Vec<(String, Vec<u8>)> = (0..pages)
            .map(|i| (format!("{:03}.jpg", i), jpeg_bytes(24, 32, Some(72), 90)))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> = entries
            .iter()
            .map(|(name, data)| (name.as_str(), data.clone()))
            .collect();
        std::fs::write(dir.join(name), build_zip(&borrowed)).unwrap();
    }

    #[tokio::test]
    async fn test_progress_for_four_files() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.cbz", "b.cbz", "c.cbz", "d.cbz"] {
            write_book(temp_dir.path(), name, 2);
        }
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator =
            BatchCoordinator::new(temp_dir.path(), Config::default(), sink.clone()).unwrap();

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.succeeded, 4);
        assert_eq!(sink.progress(), vec![0, 25, 50, 75, 100]);
        assert_eq!(sink.logs().len(), 4);
        for name in ["a.pdf", "b.pdf", "c.pdf", "d.pdf"] {
            assert!(temp_dir.path().join(name).exists());
        }
    }

    #[tokio::test]
    async fn test_empty_directory_completes() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"not a comic").unwrap();
        let sink = Arc::new(RecordingSink::new());
        let mut coordinator =
            BatchCoordinator::new(temp_dir.path(), Config::default(), sink.clone()).unwrap();

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.total, 0);
        assert!(coordinator.failure_log().is_empty());
        assert_eq!(sink.progress(), vec![0, 100]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut coordinator = BatchCoordinator::new(
            &temp_dir.path().join("absent"),
            Config::default(),
            Arc::new(NullSink),
        )
        .unwrap();

        assert!(coordinator.run().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            jpeg_quality: 0,
            ..Default::default()
        };
        assert!(BatchCoordinator::new(temp_dir.path(), config, Arc::new(NullSink)).is_err());
    }

    #[tokio::test]
    async fn test_bounded_concurrency_and_failure_log_reset() {
        let temp_dir = TempDir::new().unwrap();
        write_book(temp_dir.path(), "good.cbz", 1);
        std::fs::write(temp_dir.path().join("bad.cbr"), b"garbage").unwrap();
        let config = Config {
            max_concurrent: Some(1),
            ..Default::default()
        };
        let mut coordinator =
            BatchCoordinator::new(temp_dir.path(), config, Arc::new(NullSink)).unwrap();

        coordinator.run().await.unwrap();
        let bad = temp_dir.path().join("bad.cbr");
        assert_eq!(coordinator.failure_log().len(), 1);
        assert_eq!(coordinator.failure_log().get(&bad).unwrap().stage, Stage::Extract);

        std::fs::remove_file(&bad).unwrap();
        let report = coordinator.run().await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(coordinator.failure_log().is_empty());
    }

    #[tokio::test]
    async fn test_stop_cancels_every_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.cbz", "b.cbz", "c.cbz"] {
            write_book(temp_dir.path(), name, 1);
        }
        let sink = Arc::new(StopOnStart::default());
        let mut coordinator =
            BatchCoordinator::new(temp_dir.path(), Config::default(), sink.clone()).unwrap();
        *sink.stop_sender.lock().unwrap() = Some(coordinator.stop_sender());

        let report = coordinator.run().await.unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed(), 3);
        for (_, failure) in coordinator.failure_log().iter() {
            assert_eq!(failure.stage, Stage::Extract);
            assert_eq!(failure.reason, ConvertError::Cancelled.to_string());
        }
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            assert!(!temp_dir.path().join(name).exists());
        }
        let leftovers = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".work"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
