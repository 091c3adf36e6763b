//! `cof verify` – compare recorded downloads with the files on disk.

use anyhow::{bail, Result};
use cof_core::config::AgentConfig;
use cof_core::ledger::{self, DownloadLedger};

pub fn run_verify(cfg: &AgentConfig) -> Result<()> {
    let ledger = DownloadLedger::open_file(cfg.ledger_path()?)?;
    let report = ledger::verify(&ledger);
    for finding in &report.findings {
        println!("{}  {}  ({})", finding.problem, finding.path.display(), finding.url);
    }
    println!(
        "checked {}  problems {}  without details {}",
        report.checked,
        report.findings.len(),
        report.without_details
    );
    if !report.is_clean() {
        bail!("{} recorded downloads failed verification", report.findings.len());
    }
    Ok(())
}
