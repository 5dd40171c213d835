//! # Converter Module
//!
//! Separa le responsabilità della conversione in sottomoduli:
//! - `batch_coordinator`: Orchestratore del batch
//! - `pipeline`: Worker per il singolo archivio
//! - `progress_tracker`: Aggregatore di progresso e FailureLog
//! - `path_resolver`: Calcolo centralizzato dei path

pub mod batch_coordinator;
pub mod path_resolver;
pub mod pipeline;
pub mod progress_tracker;

pub use batch_coordinator::BatchCoordinator;
pub use path_resolver::PathResolver;
pub use pipeline::{ConversionPipeline, Outcome, PipelineState, Stage};
pub use progress_tracker::{progress_percent, FileCompletion, ProgressTracker};
