//! Settings file management

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::CliError;
use crate::filesys::file::File;
use crate::logs::LogLevel;
use crate::logstream::polling::DEFAULT_POLL_INTERVAL;

/// Which log delivery mechanism to use while a build runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogTransport {
    /// Stream when a log stream endpoint is configured, otherwise poll
    #[default]
    Auto,
    Polling,
    Streaming,
}

/// CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level for local diagnostics
    #[serde(default)]
    pub log_level: LogLevel,

    /// Base URL for the REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Websocket base URL for build log streaming
    #[serde(default)]
    pub logstream_url: Option<String>,

    #[serde(default)]
    pub log_transport: LogTransport,

    /// Project builds are deployed into
    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    access_token: Option<String>,

    /// Polling interval for build logs in milliseconds
    #[serde(default = "default_log_poll_interval")]
    pub log_poll_interval_ms: u64,

    #[serde(default)]
    pub skip_version_check: bool,

    /// Endpoint describing the latest published release
    #[serde(default = "default_release_url")]
    pub release_url: String,
}

fn default_api_url() -> String {
    "https://rest.buildship.dev/v2".to_string()
}

fn default_log_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_release_url() -> String {
    "https://api.github.com/repos/buildship-dev/buildship-cli/releases/latest".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            api_url: default_api_url(),
            logstream_url: None,
            log_transport: LogTransport::Auto,
            project_id: None,
            access_token: None,
            log_poll_interval_ms: default_log_poll_interval(),
            skip_version_check: false,
            release_url: default_release_url(),
        }
    }
}

impl Settings {
    /// Load settings from disk, falling back to defaults when the file is absent
    pub async fn load(file: &File) -> Result<Self, CliError> {
        if !file.exists().await {
            debug!("no settings at {}, using defaults", file.path().display());
            return Ok(Self::default());
        }
        file.read_json().await.map_err(|e| {
            CliError::Configuration(format!(
                "invalid settings file {}: {e}",
                file.path().display()
            ))
        })
    }

    /// Override values from `BUILDSHIP_*` environment variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BUILDSHIP_API_URL") {
            self.api_url = url;
        }
        if let Some(url) = lookup("BUILDSHIP_LOGSTREAM_URL") {
            self.logstream_url = Some(url);
        }
        if let Some(project) = lookup("BUILDSHIP_PROJECT_ID") {
            self.project_id = Some(project);
        }
        if let Some(token) = lookup("BUILDSHIP_API_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(skip) = lookup("BUILDSHIP_SKIP_VERSION_CHECK") {
            self.skip_version_check = matches!(skip.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn access_token(&self) -> Option<SecretString> {
        self.access_token.clone().map(SecretString::from)
    }

    /// Project id, required for any deployment
    pub fn require_project_id(&self) -> Result<&str, CliError> {
        self.project_id.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
            CliError::Configuration(
                "no project configured; set project_id in settings or BUILDSHIP_PROJECT_ID".into(),
            )
        })
    }

    /// Token, required for any deployment
    pub fn require_access_token(&self) -> Result<SecretString, CliError> {
        self.access_token().ok_or_else(|| {
            CliError::Configuration("not logged in; run `buildship login` or set BUILDSHIP_API_TOKEN".into())
        })
    }
}
