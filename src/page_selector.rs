//! # Page Selection
//!
//! Applica la policy di selezione pagine alla working directory appena estratta.
//! `DropLast` elimina il file con il nome più alto in ordine ordinale; è un'operazione
//! best effort: un errore viene solo loggato e lo stage riporta comunque successo.

use crate::{config::PageSelection, file_manager::FileManager};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct PageSelector {
    policy: PageSelection,
}

impl PageSelector {
    pub fn new(policy: PageSelection) -> Self {
        Self { policy }
    }

    /// Apply the policy; returns the removed file, if any. Never fails.
    pub fn apply(&self, working_dir: &Path) -> Option<PathBuf> {
        match self.policy {
            PageSelection::KeepAll => None,
            PageSelection::DropLast => Self::drop_last(working_dir),
        }
    }

    fn drop_last(working_dir: &Path) -> Option<PathBuf> {
        let last = match FileManager::list_files(working_dir) {
            Ok(files) => files.into_iter().last(),
            Err(e) => {
                warn!("Page selection could not list {}: {}", working_dir.display(), e);
                return None;
            }
        };

        let Some(last) = last else {
            warn!("Page selection found no pages in {}", working_dir.display());
            return None;
        };

        match std::fs::remove_file(&last) {
            Ok(()) => {
                debug!("Dropped last page {}", last.display());
                Some(last)
            }
            Err(e) => {
                warn!("Failed to drop last page {}: {}", last.display(), e);
                None
            }
        }
    }
}
