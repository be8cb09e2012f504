//! Persistent price history keyed by product identifier.
//!
//! The whole map is loaded at startup, shared by every source task behind
//! one mutex, and written back as a single JSON document.

use crate::amazon::models::ObservedRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Last-known state for one product identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    pub url: String,
    pub last_seen_price: Decimal,
    pub last_seen_condition: String,
    /// Only ever moves down between drop notifications
    pub last_notified_price_for_drop: Option<Decimal>,
    pub first_seen_notified: bool,
    pub source_last_seen: String,
    pub last_updated: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for an identifier observed for the first time.
    pub fn first_seen(observed: &ObservedRecord) -> Self {
        Self {
            name: observed.name.clone(),
            url: observed.url.clone(),
            last_seen_price: observed.price,
            last_seen_condition: observed.condition.clone(),
            last_notified_price_for_drop: None,
            first_seen_notified: true,
            source_last_seen: observed.source_label.clone(),
            last_updated: observed.observed_at,
        }
    }

    /// Copy with price, display fields and timestamp taken from `observed`.
    pub fn refreshed(&self, observed: &ObservedRecord) -> Self {
        Self {
            name: observed.name.clone(),
            url: observed.url.clone(),
            last_seen_price: observed.price,
            last_seen_condition: observed.condition.clone(),
            last_notified_price_for_drop: self.last_notified_price_for_drop,
            first_seen_notified: self.first_seen_notified,
            source_last_seen: observed.source_label.clone(),
            last_updated: observed.observed_at,
        }
    }
}

/// In-memory history map with optional JSON file persistence.
pub struct HistoryStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, HistoryEntry>>,
    /// Serializes writers of the file
    flush_lock: Mutex<()>,
    pending: AtomicUsize,
    flush_every: usize,
}

impl HistoryStore {
    /// Opens the store backed by `path`, loading whatever it holds.
    ///
    /// `None` keeps history in memory only for this run.
    pub async fn open(path: Option<PathBuf>, flush_every: usize) -> Self {
        let entries = match &path {
            Some(path) => Self::load_all(path).await,
            None => {
                debug!("History persistence disabled");
                BTreeMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
            flush_lock: Mutex::new(()),
            pending: AtomicUsize::new(0),
            flush_every: flush_every.max(1),
        }
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
            flush_lock: Mutex::new(()),
            pending: AtomicUsize::new(0),
            flush_every: 1,
        }
    }

    /// Reads the persisted map. A missing, unreadable or corrupt file
    /// yields an empty map.
    pub async fn load_all(path: &Path) -> BTreeMap<String, HistoryEntry> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No history at {}, starting fresh", path.display());
                return BTreeMap::new();
            }
            Err(e) => {
                warn!(
                    "Could not read history {} ({}); starting from empty history, previous entries may be overwritten",
                    path.display(),
                    e
                );
                return BTreeMap::new();
            }
        };

        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str::<BTreeMap<String, HistoryEntry>>(&content) {
            Ok(entries) => {
                info!("Loaded {} history entries from {}", entries.len(), path.display());
                entries
            }
            Err(e) => {
                warn!(
                    "History {} is corrupt ({}); starting from empty history, previous entries may be overwritten",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        }
    }

    /// Returns the entry for `id`.
    pub async fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.entries.lock().await.get(id).cloned()
    }

    /// Upserts the entry for `id`, replacing it entirely.
    pub async fn put(&self, id: impl Into<String>, entry: HistoryEntry) {
        self.entries.lock().await.insert(id.into(), entry);
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Atomic read-decide-write for one identifier.
    ///
    /// `decide` sees the current entry and returns the replacement plus a
    /// value for the caller. No other task can touch the map meanwhile.
    pub async fn update<T, E>(
        &self,
        id: &str,
        decide: impl FnOnce(Option<&HistoryEntry>) -> Result<(HistoryEntry, T), E>,
    ) -> Result<T, E> {
        let mut entries = self.entries.lock().await;
        let (entry, out) = decide(entries.get(id))?;
        entries.insert(id.to_string(), entry);
        self.pending.fetch_add(1, Ordering::SeqCst);
        Ok(out)
    }

    /// Number of stored identifiers.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Snapshot of every entry, ordered by identifier.
    pub async fn entries(&self) -> Vec<(String, HistoryEntry)> {
        self.entries.lock().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Updates not yet written to disk.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Path of the backing file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flushes when at least `flush_every` updates are pending.
    pub async fn checkpoint(&self) -> Result<()> {
        if self.pending() >= self.flush_every {
            self.flush().await
        } else {
            Ok(())
        }
    }

    /// Writes the whole map to disk via a temporary sibling file.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            self.pending.store(0, Ordering::SeqCst);
            return Ok(());
        };

        let _guard = self.flush_lock.lock().await;

        let (json, count, written) = {
            let entries = self.entries.lock().await;
            let json =
                serde_json::to_string_pretty(&*entries).context("Failed to serialize history")?;
            (json, entries.len(), self.pending())
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        // updates that landed after the snapshot stay pending
        self.pending.fetch_sub(written, Ordering::SeqCst);
        debug!("Flushed {} history entries to {}", count, path.display());
        Ok(())
    }

    /// Explicit history reset: drops every entry and persists the empty map.
    pub async fn reset(&self) -> Result<usize> {
        let removed = {
            let mut entries = self.entries.lock().await;
            let removed = entries.len();
            entries.clear();
            removed
        };
        self.flush().await?;
        info!("History reset, {} entries removed", removed);
        Ok(removed)
    }
}
