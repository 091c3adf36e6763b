//! `cof status` – ledger summary and schedule.

use anyhow::Result;
use cof_core::clock::{Clock, SystemClock};
use cof_core::config::AgentConfig;
use cof_core::ledger::DownloadLedger;
use cof_core::scheduler::within_any;

pub fn run_status(cfg: &AgentConfig) -> Result<()> {
    let ledger_path = cfg.ledger_path()?;
    let ledger = DownloadLedger::open_file(&ledger_path)?;
    let summary = ledger.summary();

    println!("ledger:     {}", ledger_path.display());
    println!("data dir:   {}", cfg.data_dir()?.display());
    println!("downloaded: {} files, {:.1} MiB", summary.entries, summary.bytes as f64 / 1_048_576.0);
    if summary.without_details > 0 {
        println!("            {} entries without size/checksum", summary.without_details);
    }
    match summary.last_recorded {
        Some(t) => println!("last:       {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last:       -"),
    }

    let windows = cfg.execution_windows()?;
    let labels: Vec<String> = windows.iter().map(|w| w.to_string()).collect();
    let open = within_any(&windows, SystemClock.now());
    println!(
        "windows:    {} ({})",
        labels.join(", "),
        if open { "open now" } else { "closed now" }
    );
    Ok(())
}
