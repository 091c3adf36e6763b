use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::{ExecutionWindow, WindowError};

/// Environment variable holding the platform login e-mail.
pub const EMAIL_ENV: &str = "COF_EMAIL";
/// Environment variable holding the platform login password.
pub const PASSWORD_ENV: &str = "COF_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),
    #[error("no courses configured")]
    NoCourses,
    #[error("api_base must not be empty")]
    EmptyApiBase,
    #[error("batch.min must be at least 1")]
    ZeroBatch,
    #[error("batch.min ({min}) is greater than batch.max ({max})")]
    BatchRange { min: usize, max: usize },
    #[error("poll_interval_secs must be at least 1")]
    ZeroPollInterval,
    #[error("page_limit must be at least 1")]
    ZeroPageLimit,
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// A course to monitor: platform id plus the name used for its directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRef {
    pub id: u64,
    pub name: String,
}

/// Inclusive range for the random batch size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BatchSizeConfig {
    pub min: usize,
    pub max: usize,
}

impl Default for BatchSizeConfig {
    fn default() -> Self {
        Self { min: 10, max: 15 }
    }
}

/// Daily window as written in config.toml (`start = "02:00"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
}

/// HTTP timeouts (seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Catalog pages and probes.
    pub request_timeout_secs: u64,
    /// Whole-file media downloads.
    pub download_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
        }
    }
}

/// Global configuration loaded from `~/.config/cof/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// REST API root, e.g. `https://api.seminariodefilosofia.org/v1`.
    pub api_base: String,
    /// Login page handed to the external login command.
    pub login_url: String,
    /// Also archive every enrolled course that is not listed in `courses`.
    #[serde(default)]
    pub include_enrolled: bool,
    /// Pause between two consecutive downloads.
    pub throttle_secs: u64,
    /// How often the scheduler checks the clock.
    pub poll_interval_secs: u64,
    /// `limit` used for paginated catalog requests.
    pub page_limit: u32,
    /// Root of the downloaded tree. Defaults to `~/.local/share/cof`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Ledger file. Defaults to `~/.local/state/cof/state.json`.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Stored session token. Defaults to `~/.local/state/cof/token.json`.
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// External program that logs in and prints a fresh token on stdout.
    #[serde(default)]
    pub login_command: Option<Vec<String>>,
    #[serde(default)]
    pub batch: BatchSizeConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub courses: Vec<CourseRef>,
    pub windows: Vec<WindowConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.seminariodefilosofia.org/v1".to_string(),
            login_url: "https://app.seminariodefilosofia.org/login".to_string(),
            courses: vec![
                CourseRef {
                    id: 1,
                    name: "COF Original".to_string(),
                },
                CourseRef {
                    id: 30,
                    name: "COF Remasterizado".to_string(),
                },
            ],
            include_enrolled: false,
            batch: BatchSizeConfig::default(),
            throttle_secs: 10,
            poll_interval_secs: 300,
            windows: vec![
                WindowConfig {
                    start: "02:00".to_string(),
                    end: "04:00".to_string(),
                },
                WindowConfig {
                    start: "10:00".to_string(),
                    end: "12:00".to_string(),
                },
            ],
            page_limit: 100,
            data_dir: None,
            ledger_path: None,
            token_path: None,
            login_command: None,
            http: HttpConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Checks invariants that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::EmptyApiBase);
        }
        if self.courses.is_empty() && !self.include_enrolled {
            return Err(ConfigError::NoCourses);
        }
        if self.batch.min == 0 {
            return Err(ConfigError::ZeroBatch);
        }
        if self.batch.min > self.batch.max {
            return Err(ConfigError::BatchRange {
                min: self.batch.min,
                max: self.batch.max,
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit);
        }
        self.execution_windows()?;
        Ok(())
    }

    /// Parsed execution windows.
    pub fn execution_windows(&self) -> Result<Vec<ExecutionWindow>, WindowError> {
        self.windows
            .iter()
            .map(|w| ExecutionWindow::parse(&w.start, &w.end))
            .collect()
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(base_dirs()?.get_data_home()),
        }
    }

    pub fn ledger_path(&self) -> Result<PathBuf> {
        match &self.ledger_path {
            Some(p) => Ok(p.clone()),
            None => Ok(base_dirs()?.get_state_home().join("state.json")),
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.token_path {
            Some(p) => Ok(p.clone()),
            None => Ok(base_dirs()?.get_state_home().join("token.json")),
        }
    }
}

/// Login credentials, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Reads `COF_EMAIL` / `COF_PASSWORD`. Missing or blank values are fatal at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };
        Ok(Self {
            email: get(EMAIL_ENV)?,
            password: get(PASSWORD_ENV)?,
        })
    }
}

fn base_dirs() -> Result<xdg::BaseDirectories> {
    Ok(xdg::BaseDirectories::with_prefix("cof")?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(base_dirs()?.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<AgentConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = AgentConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: AgentConfig = toml::from_str(&data)?;
    Ok(cfg)
}
