//! History inspection and explicit reset.

use crate::config::Config;
use crate::format::Formatter;
use crate::history::HistoryStore;
use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

/// Shows or resets the persisted price history.
pub struct HistoryCommand {
    config: Config,
}

impl HistoryCommand {
    /// Creates a new history command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn path(&self) -> Result<PathBuf> {
        match self.config.history_file() {
            Some(path) => Ok(path),
            None => bail!("History is disabled (use_history = false)"),
        }
    }

    /// Lists entries, most recently updated first.
    pub async fn show(&self, limit: Option<usize>) -> Result<String> {
        let path = self.path()?;
        let mut entries: Vec<_> = HistoryStore::load_all(&path).await.into_iter().collect();

        entries.sort_by(|a, b| b.1.last_updated.cmp(&a.1.last_updated));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_history(&entries, self.config.region.currency()))
    }

    /// Drops every stored entry.
    pub async fn reset(&self) -> Result<String> {
        let path = self.path()?;
        info!("Resetting history at {}", path.display());

        let store = HistoryStore::open(Some(path.clone()), self.config.history_flush_every).await;
        let removed = store.reset().await?;
        Ok(format!("Removed {} entries from {}", removed, path.display()))
    }
}
