//! On-disk shape of the ledger file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const LEDGER_VERSION: u32 = 1;

/// What is known about one completed download. Entries migrated from the
/// flat URL list carry no details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LedgerFileRef<'a> {
    pub version: u32,
    pub downloaded: &'a BTreeMap<String, LedgerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LedgerFile {
    Versioned {
        version: u32,
        downloaded: BTreeMap<String, LedgerEntry>,
    },
    /// `{"downloaded": ["url", ...]}`
    Flat { downloaded: Vec<String> },
}
