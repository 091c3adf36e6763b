//! Re-checks ledger entries against the files on disk.

use std::fmt;
use std::path::PathBuf;

use super::DownloadLedger;
use crate::checksum::sha256_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    SizeMismatch { expected: u64, actual: u64 },
    HashMismatch { expected: String, actual: String },
    Unreadable(String),
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => f.write_str("missing"),
            Problem::SizeMismatch { expected, actual } => {
                write!(f, "size {} != recorded {}", actual, expected)
            }
            Problem::HashMismatch { expected, actual } => {
                write!(f, "sha256 {} != recorded {}", actual, expected)
            }
            Problem::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub url: String,
    pub path: PathBuf,
    pub problem: Problem,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checked: usize,
    /// Entries migrated from a flat ledger: nothing to compare against.
    pub without_details: usize,
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Checks presence, size and SHA-256 of every entry that recorded a path.
pub fn verify(ledger: &DownloadLedger) -> VerifyReport {
    let mut report = VerifyReport::default();
    for (url, entry) in ledger.iter() {
        let Some(path) = entry.path.clone() else {
            report.without_details += 1;
            continue;
        };
        report.checked += 1;
        if let Some(problem) = check(&path, entry.bytes, entry.sha256.as_deref()) {
            tracing::warn!("{}: {} ({})", path.display(), problem, url);
            report.findings.push(Finding {
                url: url.to_string(),
                path,
                problem,
            });
        }
    }
    report
}

fn check(path: &std::path::Path, bytes: Option<u64>, sha256: Option<&str>) -> Option<Problem> {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Some(Problem::Missing),
        Err(e) => return Some(Problem::Unreadable(e.to_string())),
    };
    if let Some(expected) = bytes {
        if meta.len() != expected {
            return Some(Problem::SizeMismatch {
                expected,
                actual: meta.len(),
            });
        }
    }
    let expected = sha256?;
    match sha256_path(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected) => None,
        Ok(actual) => Some(Problem::HashMismatch {
            expected: expected.to_string(),
            actual,
        }),
        Err(e) => Some(Problem::Unreadable(format!("{:#}", e))),
    }
}
