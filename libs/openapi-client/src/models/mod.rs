//! API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response to creating (or redeploying) an app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppResponse {
    pub build_id: String,
    pub status: String,
    /// Pre-signed target for the archive PUT. Empty for partner apps.
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub key_name: String,
    #[serde(default)]
    pub internal_endpoint: String,
    #[serde(default)]
    pub dashboard_url: String,
}

/// A single build of an app
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppBuild {
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One line of build output as returned by the logs endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLog {
    #[serde(default)]
    pub id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub log: String,
    #[serde(default)]
    pub stream: Option<String>,
}

/// Full log history of a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildLogsResponse {
    #[serde(default)]
    pub logs: Vec<BuildLog>,
    #[serde(default)]
    pub status: String,
}

/// Message pushed over the build log websocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLogMessage {
    pub build_id: String,
    #[serde(default)]
    pub app_id: String,
    /// RFC 3339 with nanoseconds. Kept raw, it is part of the line identity.
    pub timestamp: String,
    /// `stdout`, `stderr` or `build`
    #[serde(default)]
    pub stream: String,
    pub log: String,
    #[serde(default)]
    pub line_number: u64,
    #[serde(default)]
    pub stage: String,
}

/// Error response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// The most descriptive text the server sent back
    pub fn text(&self) -> &str {
        if !self.message.is_empty() {
            &self.message
        } else {
            &self.error
        }
    }
}

/// Latest release as reported by the GitHub releases API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub html_url: String,
}
