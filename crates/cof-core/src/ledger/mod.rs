//! Persistent download ledger: the durable set of source URLs whose file was
//! fully written. Every successful record is saved before returning, so a
//! crash never loses a completed download nor re-fetches it.

mod format;
mod store;
mod verify;

pub use format::{LedgerEntry, LEDGER_VERSION};
#[cfg(test)]
pub(crate) use store::memory::MemoryStore;
pub use store::{JsonFileStore, LedgerStore};
pub use verify::{verify, Finding, Problem, VerifyReport};

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("ledger {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
    #[error("replace ledger file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Totals shown by `cof status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    pub entries: usize,
    pub bytes: u64,
    /// Entries without details (migrated flat ledgers).
    pub without_details: usize,
    pub last_recorded: Option<DateTime<Utc>>,
}

pub struct DownloadLedger {
    store: Box<dyn LedgerStore>,
    entries: BTreeMap<String, LedgerEntry>,
}

impl DownloadLedger {
    /// Loads the current content of `store`.
    pub fn open(store: impl LedgerStore + 'static) -> Result<Self, LedgerError> {
        let entries = store.load()?;
        tracing::debug!("ledger {}: {} entries", store.describe(), entries.len());
        Ok(Self {
            store: Box::new(store),
            entries,
        })
    }

    /// Ledger backed by a JSON file; a missing file is an empty ledger.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        Self::open(JsonFileStore::new(path))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<&LedgerEntry> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LedgerEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn urls(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Destination paths owned by recorded URLs.
    pub fn claimed_paths(&self) -> HashSet<&Path> {
        self.entries
            .values()
            .filter_map(|e| e.path.as_deref())
            .collect()
    }

    /// Records `url` and saves the whole ledger. Recording a known URL is a
    /// no-op and returns `false`.
    pub fn record_success(&mut self, url: &str, entry: LedgerEntry) -> Result<bool, LedgerError> {
        if self.entries.contains_key(url) {
            return Ok(false);
        }
        self.entries.insert(url.to_string(), entry);
        if let Err(e) = self.store.save(&self.entries) {
            self.entries.remove(url);
            return Err(e);
        }
        Ok(true)
    }

    pub fn summary(&self) -> LedgerSummary {
        let mut bytes = 0;
        let mut without_details = 0;
        let mut last: Option<i64> = None;
        for entry in self.entries.values() {
            bytes += entry.bytes.unwrap_or(0);
            if entry.path.is_none() {
                without_details += 1;
            }
            if let Some(t) = entry.recorded_at {
                last = Some(last.map_or(t, |l| l.max(t)));
            }
        }
        LedgerSummary {
            entries: self.entries.len(),
            bytes,
            without_details,
            last_recorded: last.and_then(|t| Utc.timestamp_opt(t, 0).single()),
        }
    }
}

impl std::fmt::Debug for DownloadLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadLedger")
            .field("store", &self.store.describe())
            .field("entries", &self.entries.len())
            .finish()
    }
}
