//! Streaming one media file to disk: `<dest>.cof-part`, fsync, rename.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::checksum::HashingWriter;
use crate::http::{HttpError, Request, Transport};

pub use crate::naming::PART_SUFFIX;

const WRITE_BUF: usize = 64 * 1024;

/// `file.mp3` → `file.mp3.cof-part`
pub fn part_path(dest: &Path) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(PART_SUFFIX);
    PathBuf::from(o)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: u64,
    pub sha256: String,
}

/// Downloads `request` into `dest`. The final name only appears once the body
/// is complete and synced; on any error the partial file is removed.
pub fn fetch_to(transport: &dyn Transport, request: &Request, dest: &Path) -> Result<Fetched, HttpError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let part = part_path(dest);
    let result = write_part(transport, request, &part).and_then(|fetched| {
        fs::rename(&part, dest)?;
        Ok(fetched)
    });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn write_part(transport: &dyn Transport, request: &Request, part: &Path) -> Result<Fetched, HttpError> {
    let file = File::create(part)?;
    let mut sink = HashingWriter::new(BufWriter::with_capacity(WRITE_BUF, file));
    transport.download(request, &mut sink)?;
    sink.flush()?;
    let (buffered, sha256, bytes) = sink.finish();
    let file = buffered.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(Fetched { bytes, sha256 })
}
