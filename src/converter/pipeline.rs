//! # Conversion Pipeline Module
//!
//! Worker per la conversione di un singolo archivio.
//!
//! Stati, in ordine stretto:
//! `Created → Extracted → PageSelected → Compressed → Assembled → Cleaned`.
//! Uno stage fallito interrompe i successivi, ma la pulizia della working
//! directory viene eseguita sempre. Il lavoro bloccante di ogni stage gira su
//! `spawn_blocking` per non fermare gli altri archivi.

use crate::{
    archive_extractor::ArchiveExtractor,
    config::Config,
    converter::path_resolver::PathResolver,
    error::ConvertError,
    image_compressor::{CompressionStats, ImageCompressor},
    page_selector::PageSelector,
    pdf_assembler::PdfAssembler,
};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const CLEANUP_ATTEMPTS: u32 = 5;
const CLEANUP_BASE_DELAY: Duration = Duration::from_millis(50);

/// One step of the conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    SelectPages,
    Compress,
    Assemble,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Extract => "extract",
            Self::SelectPages => "select pages",
            Self::Compress => "compress",
            Self::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// Lifecycle position of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Extracted,
    PageSelected,
    Compressed,
    Assembled,
    Cleaned,
}

/// Terminal result of converting one archive
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        pdf_path: PathBuf,
        pages: usize,
        compression: CompressionStats,
    },
    Failed {
        stage: Stage,
        reason: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

type StageResult<T> = Result<T, (Stage, ConvertError)>;

/// Converts a single archive, owning its working directory for the whole run
pub struct ConversionPipeline {
    config: Config,
    source: PathBuf,
    working_dir: PathBuf,
    pdf_path: PathBuf,
    state: PipelineState,
    stop_receiver: Option<broadcast::Receiver<()>>,
    stopped: bool,
}

impl ConversionPipeline {
    pub fn new(config: Config, source: PathBuf, target_dir: &Path) -> Result<Self, ConvertError> {
        let working_dir = PathResolver::working_dir(target_dir, &source)?;
        let pdf_path = PathResolver::pdf_path(target_dir, &source)?;

        Ok(Self {
            config,
            source,
            working_dir,
            pdf_path,
            state: PipelineState::Created,
            stop_receiver: None,
            stopped: false,
        })
    }

    /// Attach a stop signal, checked before every stage
    pub fn with_cancellation(mut self, stop_receiver: broadcast::Receiver<()>) -> Self {
        self.stop_receiver = Some(stop_receiver);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run every stage, then always clean up. Afterwards `state()` is `Cleaned`.
    pub async fn run(&mut self) -> Outcome {
        info!("Converting {}", self.source.display());

        let result = self.run_stages().await;
        debug!("{} reached {:?}", self.source.display(), self.state);
        self.cleanup().await;

        match result {
            Ok((pages, compression)) => Outcome::Success {
                pdf_path: self.pdf_path.clone(),
                pages,
                compression,
            },
            Err((stage, err)) => {
                warn!("Conversion of {} failed at {}: {}", self.source.display(), stage, err);
                Outcome::Failed {
                    stage,
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn run_stages(&mut self) -> StageResult<(usize, CompressionStats)> {
        self.prepare_working_dir().await.map_err(|e| {
            let reason = format!("cannot prepare {}: {}", self.working_dir.display(), e);
            (Stage::Extract, ConvertError::Extraction(reason))
        })?;

        self.check_stop(Stage::Extract)?;
        let extractor = ArchiveExtractor::new(self.config.naming);
        let (source, work) = (self.source.clone(), self.working_dir.clone());
        let extracted = run_blocking(Stage::Extract, move || extractor.extract(&source, &work)).await?;
        self.state = PipelineState::Extracted;
        debug!("{}: {} files extracted", self.source.display(), extracted);

        self.check_stop(Stage::SelectPages)?;
        let selector = PageSelector::new(self.config.page_selection);
        let work = self.working_dir.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || selector.apply(&work)).await {
            warn!("Page selection task failed for {}: {}", self.source.display(), e);
        }
        self.state = PipelineState::PageSelected;

        self.check_stop(Stage::Compress)?;
        let compressor = ImageCompressor::new(self.config.jpeg_quality);
        let work = self.working_dir.clone();
        let compression = run_blocking(Stage::Compress, move || compressor.compress_dir(&work)).await?;
        self.state = PipelineState::Compressed;

        self.check_stop(Stage::Assemble)?;
        let assembler = PdfAssembler::new(self.config.pdf_batch_size, self.config.fallback_dpi);
        let (work, output) = (self.working_dir.clone(), self.pdf_path.clone());
        let pages = run_blocking(Stage::Assemble, move || assembler.assemble(&work, &output)).await?;
        self.state = PipelineState::Assembled;

        Ok((pages, compression))
    }

    /// Create an empty working directory, wiping leftovers of an earlier run
    async fn prepare_working_dir(&self) -> Result<(), ConvertError> {
        match tokio::fs::remove_dir_all(&self.working_dir).await {
            Ok(()) => debug!("Removed stale working directory {}", self.working_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.working_dir).await?;
        Ok(())
    }

    async fn cleanup(&mut self) {
        remove_dir_with_retry(&self.working_dir, CLEANUP_ATTEMPTS, CLEANUP_BASE_DELAY).await;
        self.state = PipelineState::Cleaned;
    }

    /// Checks if a stop signal has been received (latched once seen)
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    self.stopped = true;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => {}
            }
        }
        self.stopped
    }

    fn check_stop(&mut self, next: Stage) -> StageResult<()> {
        if self.should_stop() {
            debug!("Stop requested before {} of {}", next, self.source.display());
            return Err((next, ConvertError::Cancelled));
        }
        Ok(())
    }
}

async fn run_blocking<T, F>(stage: Stage, work: F) -> StageResult<T>
where
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(|e| (stage, e)),
        Err(join_err) => {
            let reason = format!("{} task failed: {}", stage, join_err);
            let err = match stage {
                Stage::Extract | Stage::SelectPages => ConvertError::Extraction(reason),
                Stage::Compress => ConvertError::Compression(reason),
                Stage::Assemble => ConvertError::Assembly(reason),
            };
            Err((stage, err))
        }
    }
}

/// Delete `dir`, retrying with exponential backoff while handles are released.
///
/// Never fails: returns whether the directory is gone.
pub async fn remove_dir_with_retry(dir: &Path, attempts: u32, base_delay: Duration) -> bool {
    let mut delay = base_delay;
    for attempt in 1..=attempts.max(1) {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {
                debug!("Removed working directory {}", dir.display());
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) if attempt >= attempts => {
                warn!("Could not remove working directory {}: {}", dir.display(), e);
            }
            Err(e) => {
                debug!(
                    "Removing {} failed (attempt {}/{}): {}, retrying in {:?}",
                    dir.display(),
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    false
}
