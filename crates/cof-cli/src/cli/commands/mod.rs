//! CLI command handlers, one file per command.

mod completions;
mod courses;
mod run;
mod status;
mod verify;

pub use completions::run_completions;
pub use courses::run_courses;
pub use run::run_agent;
pub use status::run_status;
pub use verify::run_verify;

use anyhow::{Context, Result};
use cof_core::agent::{Agent, AgentPaths};
use cof_core::auth::SessionManager;
use cof_core::clock::SystemClock;
use cof_core::config::{AgentConfig, Credentials};
use cof_core::http::{CurlTransport, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

/// Agent wired to libcurl, the system clock and the stored session.
/// Missing credentials fail here, before any network traffic.
pub(crate) fn build_agent(cfg: &AgentConfig) -> Result<Agent<SessionManager, SystemClock>> {
    let credentials = Credentials::from_env()?;
    let paths = AgentPaths::from_config(cfg).context("resolve data and state directories")?;
    let transport: Arc<dyn Transport> = Arc::new(CurlTransport::new(Duration::from_secs(
        cfg.http.connect_timeout_secs,
    )));
    let token_path = cfg.token_path().context("resolve token path")?;
    let session = SessionManager::new(Arc::clone(&transport), cfg, token_path, credentials);
    Ok(Agent::new(
        cfg,
        paths,
        transport,
        session,
        SystemClock,
        StdRng::from_entropy(),
    ))
}
