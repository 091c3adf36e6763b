//! Session handling.
//!
//! The platform authenticates with a JWT sent as `Authorization: JWT <token>`.
//! [`SessionManager`] keeps the last token in `token.json`, checks it against
//! `accounts/` and, when it is missing or rejected, runs the configured
//! external login program to obtain a fresh one.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AgentConfig, Credentials, EMAIL_ENV, PASSWORD_ENV};
use crate::http::{self, HttpError, Request, Transport};

/// Environment variable carrying the login page URL to the login command.
pub const LOGIN_URL_ENV: &str = "COF_LOGIN_URL";

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("stored token is missing or expired and no login_command is configured")]
    NoLoginCommand,
    #[error("spawn login command {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("login command failed ({status}): {stderr}")]
    LoginFailed { status: String, stderr: String },
    #[error("login command printed no token")]
    EmptyToken,
    #[error("token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("encode token file: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Supplies a bearer token. The token is opaque to the rest of the crate.
pub trait CredentialProvider: Send + Sync {
    /// A token believed to be valid, re-authenticating when needed.
    fn token(&self) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Cheap authenticated probe.
    fn is_valid(&self, token: &str) -> impl Future<Output = bool> + Send;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    token: Option<String>,
}

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    api_base: String,
    login_url: String,
    token_path: PathBuf,
    login_command: Option<Vec<String>>,
    credentials: Credentials,
    user_agent: String,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        cfg: &AgentConfig,
        token_path: PathBuf,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            login_url: cfg.login_url.clone(),
            token_path,
            login_command: cfg.login_command.clone(),
            credentials,
            user_agent: http::user_agent::random().to_string(),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Token stored by a previous login, if any. An unreadable file counts as none.
    pub fn stored_token(&self) -> Option<String> {
        let raw = match std::fs::read(&self.token_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("read {}: {}", self.token_path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice::<TokenFile>(&raw) {
            Ok(file) => file.token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!("ignoring malformed {}: {}", self.token_path.display(), e);
                None
            }
        }
    }

    /// Writes `{"token": ...}` atomically (the temp file is created 0600).
    pub fn save_token(&self, token: &str) -> Result<(), AuthError> {
        let io_err = |source: std::io::Error| AuthError::TokenFile {
            path: self.token_path.clone(),
            source,
        };
        let parent = match self.token_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
        serde_json::to_writer(
            &mut tmp,
            &TokenFile {
                token: Some(token.to_string()),
            },
        )?;
        tmp.flush().map_err(io_err)?;
        tmp.persist(&self.token_path)?;
        tracing::debug!("token saved to {}", self.token_path.display());
        Ok(())
    }

    /// Runs the login command and stores the token it prints.
    pub async fn login(&self) -> Result<String, AuthError> {
        let argv = self
            .login_command
            .as_ref()
            .filter(|argv| !argv.is_empty())
            .ok_or(AuthError::NoLoginCommand)?;
        tracing::info!("logging in through {} ({})", argv[0], self.login_url);

        let output = tokio::process::Command::new(&argv[0])
            .args(&argv[1..])
            .env(EMAIL_ENV, &self.credentials.email)
            .env(PASSWORD_ENV, &self.credentials.password)
            .env(LOGIN_URL_ENV, &self.login_url)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| AuthError::Spawn {
                program: argv[0].clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::LoginFailed {
                status: output.status.to_string(),
                stderr: stderr.trim().chars().take(500).collect(),
            });
        }
        let token = token_from_output(&output.stdout).ok_or(AuthError::EmptyToken)?;
        self.save_token(&token)?;
        tracing::info!("login succeeded, token stored");
        Ok(token)
    }
}

/// Last non-empty line of the login program's stdout.
fn token_from_output(stdout: &[u8]) -> Option<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(str::to_string)
}

impl CredentialProvider for SessionManager {
    async fn token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.stored_token() {
            if self.is_valid(&token).await {
                tracing::info!("stored token is still valid");
                return Ok(token);
            }
        }
        tracing::info!("token expired or missing, logging in again");
        self.login().await
    }

    async fn is_valid(&self, token: &str) -> bool {
        let request = Request::get(format!("{}/accounts/", self.api_base))
            .timeout(PROBE_TIMEOUT)
            .authorized(token, &self.user_agent);
        let valid = match http::get(&self.transport, request).await {
            Ok(resp) => resp.status == 200,
            Err(e) => {
                tracing::debug!("token probe failed: {}", e);
                false
            }
        };
        tracing::debug!("token validation: {}", if valid { "ok" } else { "expired" });
        valid
    }
}

/// A fixed token that is never re-validated.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    async fn token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }

    async fn is_valid(&self, _token: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeTransport;

    const ACCOUNTS: &str = "https://api.example.test/v1/accounts/";

    fn manager(fake: &Arc<FakeTransport>, dir: &Path, login: Option<&[&str]>) -> SessionManager {
        let cfg = AgentConfig {
            api_base: "https://api.example.test/v1/".into(),
            login_command: login.map(|argv| argv.iter().map(|s| s.to_string()).collect()),
            ..AgentConfig::default()
        };
        let transport: Arc<dyn Transport> = fake.clone();
        SessionManager::new(
            transport,
            &cfg,
            dir.join("token.json"),
            Credentials {
                email: "me@example.test".into(),
                password: "secret".into(),
            },
        )
    }

    #[tokio::test]
    async fn valid_stored_token_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.reply(ACCOUNTS, 200, Vec::new(), b"{}".to_vec());
        let m = manager(&fake, dir.path(), None);
        m.save_token("stored").unwrap();
        assert_eq!(m.token().await.unwrap(), "stored");
        assert_eq!(fake.gets(), vec![ACCOUNTS.to_string()]);
    }

    #[tokio::test]
    async fn missing_token_without_login_command_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        let m = manager(&fake, dir.path(), None);
        assert!(matches!(m.token().await, Err(AuthError::NoLoginCommand)));
        assert!(fake.gets().is_empty());
    }

    #[tokio::test]
    async fn expired_token_triggers_login() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.reply(ACCOUNTS, 401, Vec::new(), Vec::new());
        let m = manager(
            &fake,
            dir.path(),
            Some(&["sh", "-c", "echo 'opening browser'; printf '%s:%s\\n' \"$COF_EMAIL\" \"$COF_LOGIN_URL\""]),
        );
        m.save_token("old").unwrap();
        let token = m.token().await.unwrap();
        assert_eq!(token, "me@example.test:https://app.seminariodefilosofia.org/login");
        assert_eq!(m.stored_token().as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn failing_login_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        let m = manager(&fake, dir.path(), Some(&["sh", "-c", "echo denied >&2; exit 3"]));
        match m.login().await {
            Err(AuthError::LoginFailed { stderr, .. }) => assert_eq!(stderr, "denied"),
            other => panic!("unexpected {other:?}"),
        }
        let m = manager(&fake, dir.path(), Some(&["sh", "-c", "true"]));
        assert!(matches!(m.login().await, Err(AuthError::EmptyToken)));
        assert!(m.stored_token().is_none());
    }

    #[test]
    fn malformed_token_file_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeTransport::new());
        let m = manager(&fake, dir.path(), None);
        std::fs::write(m.token_path(), b"not json").unwrap();
        assert!(m.stored_token().is_none());
        std::fs::write(m.token_path(), br#"{"token": null}"#).unwrap();
        assert!(m.stored_token().is_none());
    }
}
