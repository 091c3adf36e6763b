//! Backing stores for the ledger.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::format::{LedgerEntry, LedgerFile, LedgerFileRef, LEDGER_VERSION};
use super::LedgerError;

/// Durable key-value store keyed by source URL. `save` replaces the whole
/// content; a crash in the middle of a save must leave the previous content
/// readable.
pub trait LedgerStore: Send + Sync {
    /// Returns an empty map when nothing was stored yet.
    fn load(&self) -> Result<BTreeMap<String, LedgerEntry>, LedgerError>;
    fn save(&self, entries: &BTreeMap<String, LedgerEntry>) -> Result<(), LedgerError>;
    /// Where the data lives, for log lines.
    fn describe(&self) -> String;
}

/// JSON file replaced atomically (temp file in the same directory, fsync, rename).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl LedgerStore for JsonFileStore {
    fn load(&self) -> Result<BTreeMap<String, LedgerEntry>, LedgerError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        let file: LedgerFile =
            serde_json::from_slice(&raw).map_err(|source| LedgerError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        match file {
            LedgerFile::Versioned {
                version,
                downloaded,
            } => {
                if version != LEDGER_VERSION {
                    return Err(LedgerError::UnsupportedVersion {
                        path: self.path.clone(),
                        version,
                    });
                }
                Ok(downloaded)
            }
            LedgerFile::Flat { downloaded } => {
                tracing::info!(
                    "migrating flat ledger {} ({} urls)",
                    self.path.display(),
                    downloaded.len()
                );
                Ok(downloaded
                    .into_iter()
                    .map(|url| (url, LedgerEntry::default()))
                    .collect())
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, LedgerEntry>) -> Result<(), LedgerError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| self.io_err(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| self.io_err(e))?;
        let body = LedgerFileRef {
            version: LEDGER_VERSION,
            downloaded: entries,
        };
        serde_json::to_writer_pretty(&mut tmp, &body).map_err(|source| LedgerError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        tmp.write_all(b"\n").map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
