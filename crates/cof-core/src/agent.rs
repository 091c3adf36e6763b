//! One batch end to end: session, preflight, discovery, download.
//!
//! [`Agent::execute_batch`] is what the window scheduler (or `run --once`)
//! calls. Every step that cannot make progress returns an [`AgentError`];
//! per-course and per-item failures are handled inside their steps.

use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::auth::{AuthError, CredentialProvider};
use crate::batch::{sweep_partials, BatchDownloader, BatchReport, BatchSettings};
use crate::catalog::{merge_enrolled, CatalogClient, CatalogError, EnrolledCourse};
use crate::clock::Clock;
use crate::config::{AgentConfig, CourseRef};
use crate::descriptor::MediaDescriptor;
use crate::http::{self, Transport};
use crate::ledger::{DownloadLedger, LedgerError};
use crate::naming::NamingResolver;
use crate::preflight::{preflight, PreflightReport};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("preflight failed ({0}); batch aborted")]
    Preflight(PreflightReport),
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Filesystem locations resolved from the config (XDG defaults applied).
#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub data_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl AgentPaths {
    pub fn from_config(cfg: &AgentConfig) -> anyhow::Result<Self> {
        Ok(Self {
            data_dir: cfg.data_dir()?,
            ledger_path: cfg.ledger_path()?,
        })
    }
}

pub struct Agent<P, C: Clock> {
    transport: Arc<dyn Transport>,
    credentials: P,
    catalog: CatalogClient,
    downloader: BatchDownloader<C>,
    paths: AgentPaths,
    api_base: String,
    courses: Vec<CourseRef>,
    include_enrolled: bool,
    request_timeout: Duration,
    user_agent: String,
    rng: Mutex<StdRng>,
}

impl<P: CredentialProvider, C: Clock> Agent<P, C> {
    pub fn new(
        cfg: &AgentConfig,
        paths: AgentPaths,
        transport: Arc<dyn Transport>,
        credentials: P,
        clock: C,
        rng: StdRng,
    ) -> Self {
        let user_agent = http::user_agent::random().to_string();
        let request_timeout = Duration::from_secs(cfg.http.request_timeout_secs);
        let catalog = CatalogClient::new(Arc::clone(&transport), &cfg.api_base, cfg.page_limit)
            .with_timeout(request_timeout)
            .with_user_agent(&user_agent);
        let downloader = BatchDownloader::new(
            Arc::clone(&transport),
            NamingResolver::new(&paths.data_dir),
            clock,
            BatchSettings::from_config(cfg),
        )
        .with_user_agent(&user_agent);
        Self {
            transport,
            credentials,
            catalog,
            downloader,
            paths,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            courses: cfg.courses.clone(),
            include_enrolled: cfg.include_enrolled,
            request_timeout,
            user_agent,
            rng: Mutex::new(rng),
        }
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    pub fn credentials(&self) -> &P {
        &self.credentials
    }

    /// Removes downloads interrupted by a previous process. Call once at startup.
    pub fn recover(&self) -> anyhow::Result<usize> {
        let removed = sweep_partials(&self.paths.data_dir)?;
        if removed > 0 {
            tracing::warn!("removed {} interrupted downloads", removed);
        }
        Ok(removed)
    }

    pub async fn enrolled_courses(&self, token: &str) -> Result<Vec<EnrolledCourse>, CatalogError> {
        self.catalog.enrolled_courses(token).await
    }

    /// Configured courses, plus enrolled ones when `include_enrolled` is set.
    /// Failing to list enrolled courses falls back to the configured list.
    pub async fn courses(&self, token: &str) -> Vec<CourseRef> {
        if !self.include_enrolled {
            return self.courses.clone();
        }
        match self.catalog.enrolled_courses(token).await {
            Ok(enrolled) => {
                let merged = merge_enrolled(&self.courses, &enrolled);
                tracing::info!(
                    "{} enrolled courses, {} to discover",
                    enrolled.len(),
                    merged.len()
                );
                merged
            }
            Err(e) => {
                tracing::warn!("could not list enrolled courses: {}", e);
                self.courses.clone()
            }
        }
    }

    pub async fn discover(&self, token: &str) -> Vec<MediaDescriptor> {
        let courses = self.courses(token).await;
        self.catalog.discover(&courses, token).await
    }

    pub async fn preflight(&self, token: &str) -> PreflightReport {
        preflight(
            &self.transport,
            &self.api_base,
            token,
            &self.user_agent,
            self.request_timeout,
        )
        .await
    }

    /// Full batch: authenticate, preflight, discover, then download one batch.
    pub async fn execute_batch(&self, dry_run: bool) -> Result<BatchReport, AgentError> {
        tracing::info!("=== batch start (dry_run={}) ===", dry_run);

        tracing::info!("step 1/4: authentication");
        let token = self.credentials.token().await?;

        tracing::info!("step 2/4: preflight");
        let report = self.preflight(&token).await;
        if !report.passed() {
            return Err(AgentError::Preflight(report));
        }

        tracing::info!("step 3/4: discovery");
        let items = self.discover(&token).await;
        tracing::info!("{} items in catalog", items.len());
        if items.is_empty() {
            let report = BatchReport {
                dry_run,
                ..BatchReport::default()
            };
            report.log();
            return Ok(report);
        }

        tracing::info!("step 4/4: download");
        let mut ledger = DownloadLedger::open_file(&self.paths.ledger_path)?;
        let plan = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            self.downloader.plan(&items, &ledger, &mut *rng)
        };
        let report = self
            .downloader
            .execute(plan, &mut ledger, &token, dry_run)
            .await?;
        tracing::info!("=== batch done: {} files downloaded ===", report.written.len());
        Ok(report)
    }
}
