//! `cof run` – scheduler loop, or a single batch with `--once`.

use anyhow::{Context, Result};
use cof_core::batch::BatchReport;
use cof_core::clock::SystemClock;
use cof_core::config::AgentConfig;
use cof_core::scheduler::WindowScheduler;

use super::build_agent;

pub async fn run_agent(cfg: &AgentConfig, once: bool, dry_run: bool) -> Result<()> {
    let agent = build_agent(cfg)?;
    tracing::info!("cof started (dry_run={}, once={})", dry_run, once);
    if !dry_run {
        agent.recover().context("clean up interrupted downloads")?;
    }

    if once {
        let report = agent.execute_batch(dry_run).await?;
        print_report(&report);
        return Ok(());
    }

    let mut scheduler =
        WindowScheduler::new(cfg.execution_windows()?, cfg.poll_interval(), SystemClock);
    tokio::select! {
        _ = scheduler.run(|| agent.execute_batch(dry_run)) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("listen for Ctrl-C")?;
            tracing::info!("interrupted, scheduler stopped");
        }
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    if report.dry_run {
        for path in &report.planned {
            println!("would write {}", path.display());
        }
    } else {
        for path in &report.written {
            println!("wrote {}", path.display());
        }
    }
    println!(
        "pending {}  selected {}  succeeded {}  failed {}",
        report.pending, report.selected, report.succeeded, report.failed
    );
}
