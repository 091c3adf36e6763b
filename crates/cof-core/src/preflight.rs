//! Cheap probes run before committing to a batch.

use std::sync::Arc;
use std::time::Duration;

use crate::http::{self, Request, Transport};

/// Result of the three preflight checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreflightReport {
    /// `accounts/` answered 200.
    pub token_valid: bool,
    /// `accounts/` carried no `Retry-After`.
    pub not_rate_limited: bool,
    /// `courses/` answered 200.
    pub content_accessible: bool,
}

impl PreflightReport {
    pub fn passed(&self) -> bool {
        self.token_valid && self.not_rate_limited && self.content_accessible
    }
}

impl std::fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "token_valid={} not_rate_limited={} content_accessible={}",
            self.token_valid, self.not_rate_limited, self.content_accessible
        )
    }
}

/// Probes `accounts/` then `courses/`. A transport error fails every check.
pub async fn preflight(
    transport: &Arc<dyn Transport>,
    api_base: &str,
    token: &str,
    user_agent: &str,
    timeout: Duration,
) -> PreflightReport {
    let base = api_base.trim_end_matches('/');
    let accounts = Request::get(format!("{}/accounts/", base))
        .timeout(timeout)
        .authorized(token, user_agent);
    let courses = Request::get(format!("{}/courses/", base))
        .timeout(timeout)
        .authorized(token, user_agent);

    let result = http::blocking(transport, move |t| {
        let r = t.get(&accounts)?;
        let mut report = PreflightReport {
            token_valid: r.status == 200,
            not_rate_limited: r.header("retry-after").is_none(),
            content_accessible: false,
        };
        report.content_accessible = t.get(&courses)?.status == 200;
        Ok(report)
    })
    .await;

    match result {
        Ok(report) if report.passed() => {
            tracing::info!("preflight ok: {}", report);
            report
        }
        Ok(report) => {
            tracing::warn!("preflight failed: {}", report);
            report
        }
        Err(e) => {
            tracing::error!("preflight error: {}", e);
            PreflightReport::default()
        }
    }
}
