//! # cbx2pdf - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento/salvataggio opzionale della configurazione JSON
//! - Scelta del sink (progress bar o JSON lines) e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, quality, workers, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, stderr in modalità JSON)
//! 3. Costruisce il `Config` partendo dal file (se indicato) e applica i flag
//! 4. Istanzia `BatchCoordinator` e converte tutti gli archivi (Ctrl-C ferma il batch)
//! 5. Esce con codice non zero se almeno un archivio è fallito
//!
//! ## Esempio di utilizzo:
//! ```bash
//! cbx2pdf /path/to/comics --drop-last --quality 60 --workers 4 --verbose
//! ```

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use comic_to_pdf::{
    BatchCoordinator, Config, EventSink, JsonSink, NamingPolicy, PageSelection, ProgressBarSink,
};

#[derive(Clone, Copy, ValueEnum)]
enum Naming {
    /// Rename pages 00000.jpg, 00001.jpg, ... in archive order
    Sequential,
    /// Keep the file name of each entry (later duplicates overwrite earlier ones)
    BaseName,
}

impl From<Naming> for NamingPolicy {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::Sequential => NamingPolicy::Sequential,
            Naming::BaseName => NamingPolicy::BaseName,
        }
    }
}

#[derive(Parser)]
#[command(name = "cbx2pdf")]
#[command(about = "Convert CBR/CBZ comic archives to compressed PDFs")]
struct Args {
    /// Directory containing .cbr/.cbz archives (PDFs are written next to them)
    directory: PathBuf,

    /// Drop the last page of every archive
    #[arg(long)]
    drop_last: bool,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Maximum number of archives converted at the same time
    #[arg(short, long)]
    workers: Option<usize>,

    /// How extracted pages are named
    #[arg(long, value_enum)]
    naming: Option<Naming>,

    /// DPI assumed for images without density metadata
    #[arg(long)]
    fallback_dpi: Option<f32>,

    /// Emit JSON lines on stdout instead of a progress bar
    #[arg(long)]
    json: bool,

    /// Load settings from a JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Save the effective settings to a JSON file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, mut config: Config) -> Config {
        if self.drop_last {
            config.page_selection = PageSelection::DropLast;
        }
        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if let Some(workers) = self.workers {
            config.max_concurrent = Some(workers);
        }
        if let Some(naming) = self.naming {
            config.naming = naming.into();
        }
        if let Some(dpi) = self.fallback_dpi {
            config.fallback_dpi = dpi;
        }
        if self.json {
            config.json_output = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if args.json {
        tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let base_config = match args.config {
        Some(ref path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    let config = args.apply(base_config);
    config.validate()?;

    if let Some(ref path) = args.save_config {
        config.save_to_file(path).await?;
        info!("Saved configuration to {}", path.display());
    }

    let sink: Arc<dyn EventSink> = if config.json_output {
        Arc::new(JsonSink)
    } else {
        Arc::new(ProgressBarSink::new())
    };

    let mut coordinator = BatchCoordinator::new(&args.directory, config, sink)?;

    // Ctrl-C lets running pipelines finish their current stage and clean up
    let stop_sender = coordinator.stop_sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current stage");
            let _ = stop_sender.send(());
        }
    });

    let report = coordinator.run().await?;

    if !args.json {
        info!("{}", report.format_summary());
        for (path, failure) in report.failures.iter() {
            info!("  • {} [{}]: {}", path.display(), failure.stage, failure.reason);
        }
    }

    if report.failed() > 0 {
        std::process::exit(1);
    }

    Ok(())
}
