//! Batch downloader.
//!
//! Picks a randomly sized prefix of the pending items (catalog order), then
//! downloads them one by one with a fixed pause between consecutive items.
//! A URL enters the ledger only after its file is complete on disk; a failed
//! item is logged and stays pending for a later batch.

mod fetch;
mod plan;
mod sweep;

pub use fetch::{fetch_to, part_path, Fetched, PART_SUFFIX};
pub use plan::{assign_destinations, batch_size, pending, plan, BatchPlan, PlannedItem};
pub use sweep::sweep_partials;

use anyhow::Context;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::AgentConfig;
use crate::descriptor::MediaDescriptor;
use crate::http::{self, Request, Transport};
use crate::ledger::{DownloadLedger, LedgerEntry, LedgerError};
use crate::naming::NamingResolver;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub min: usize,
    pub max: usize,
    pub throttle: Duration,
    pub download_timeout: Duration,
}

impl BatchSettings {
    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self {
            min: cfg.batch.min,
            max: cfg.batch.max,
            throttle: cfg.throttle(),
            download_timeout: Duration::from_secs(cfg.http.download_timeout_secs),
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub pending: usize,
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Destinations of the selected items (written or, in dry-run, would be).
    pub planned: Vec<PathBuf>,
    /// Files actually written in this batch.
    pub written: Vec<PathBuf>,
    pub dry_run: bool,
}

impl BatchReport {
    /// One structured line with the batch counts.
    pub fn log(&self) {
        tracing::info!(
            pending = self.pending,
            selected = self.selected,
            succeeded = self.succeeded,
            failed = self.failed,
            dry_run = self.dry_run,
            "batch finished"
        );
    }
}

pub struct BatchDownloader<C: Clock> {
    transport: Arc<dyn Transport>,
    resolver: NamingResolver,
    clock: C,
    settings: BatchSettings,
    user_agent: String,
}

impl<C: Clock> BatchDownloader<C> {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: NamingResolver,
        clock: C,
        settings: BatchSettings,
    ) -> Self {
        Self {
            transport,
            resolver,
            clock,
            settings,
            user_agent: http::user_agent::random().to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn resolver(&self) -> &NamingResolver {
        &self.resolver
    }

    pub fn plan<R: Rng + ?Sized>(
        &self,
        descriptors: &[MediaDescriptor],
        ledger: &DownloadLedger,
        rng: &mut R,
    ) -> BatchPlan {
        plan(
            descriptors,
            ledger,
            &self.resolver,
            self.settings.min,
            self.settings.max,
            rng,
        )
    }

    /// Plans and executes one batch.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        descriptors: &[MediaDescriptor],
        ledger: &mut DownloadLedger,
        token: &str,
        rng: &mut R,
        dry_run: bool,
    ) -> Result<BatchReport, LedgerError> {
        let plan = self.plan(descriptors, ledger, rng);
        self.execute(plan, ledger, token, dry_run).await
    }

    /// Downloads the planned items in order. Per-item failures are counted and
    /// logged; only a ledger write failure aborts the batch.
    pub async fn execute(
        &self,
        plan: BatchPlan,
        ledger: &mut DownloadLedger,
        token: &str,
        dry_run: bool,
    ) -> Result<BatchReport, LedgerError> {
        let mut report = BatchReport {
            pending: plan.pending,
            selected: plan.items.len(),
            planned: plan.items.iter().map(|i| i.destination.clone()).collect(),
            dry_run,
            ..BatchReport::default()
        };
        if plan.items.is_empty() {
            tracing::info!("no pending items");
            report.log();
            return Ok(report);
        }
        tracing::info!(
            "{} pending, batch of {} selected ({} left after batch)",
            plan.pending,
            plan.items.len(),
            plan.pending - plan.items.len()
        );

        if dry_run {
            for item in &plan.items {
                tracing::info!(
                    "[dry-run] would fetch '{}' -> {}",
                    item.descriptor.title,
                    item.destination.display()
                );
            }
            report.log();
            return Ok(report);
        }

        let total = plan.items.len();
        for (i, item) in plan.items.into_iter().enumerate() {
            match self.fetch(&item, token).await {
                Ok(fetched) => {
                    let entry = LedgerEntry {
                        path: Some(item.destination.clone()),
                        bytes: Some(fetched.bytes),
                        sha256: Some(fetched.sha256),
                        recorded_at: Some(chrono::Utc::now().timestamp()),
                    };
                    ledger.record_success(&item.descriptor.source_url, entry)?;
                    tracing::info!(
                        "downloaded ({}/{}): {} ({} bytes)",
                        i + 1,
                        total,
                        item.destination.display(),
                        fetched.bytes
                    );
                    report.succeeded += 1;
                    report.written.push(item.destination);
                }
                Err(e) => {
                    tracing::error!("download failed for '{}': {:#}", item.descriptor.title, e);
                    report.failed += 1;
                }
            }

            if i + 1 < total {
                tracing::debug!(
                    "waiting {}s before the next download",
                    self.settings.throttle.as_secs()
                );
                self.clock.sleep(self.settings.throttle).await;
            }
        }

        report.log();
        Ok(report)
    }

    async fn fetch(&self, item: &PlannedItem, token: &str) -> anyhow::Result<Fetched> {
        let url = item.descriptor.source_url.clone();
        let request = Request::get(url.as_str())
            .timeout(self.settings.download_timeout)
            .authorized(token, &self.user_agent);
        let dest = item.destination.clone();
        http::blocking(&self.transport, move |t| fetch_to(t, &request, &dest))
            .await
            .with_context(|| format!("GET {}", url))
    }
}

#[cfg(test)]
mod tests;
