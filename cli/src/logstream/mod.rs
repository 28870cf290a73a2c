//! Build log delivery
//!
//! Two providers implement [`LogProvider`]: one polls the full log history,
//! the other holds a websocket open. The orchestrator only sees the trait.

pub mod buffer;
pub mod polling;
pub mod streaming;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openapi_client::{BuildLog, BuildLogMessage};
use tokio::sync::mpsc;

use crate::deploy::cancel::CancelToken;
use crate::errors::CliError;

pub use buffer::LogBuffer;
pub use polling::PollingLogProvider;
pub use streaming::{StreamingLogProvider, StreamingOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
    Build,
}

impl LogSource {
    fn parse(stream: Option<&str>) -> Self {
        match stream {
            Some("stdout") => LogSource::Stdout,
            Some("stderr") => LogSource::Stderr,
            _ => LogSource::Build,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Identity used to drop repeats
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub source: LogSource,
}

impl From<BuildLog> for LogEntry {
    fn from(log: BuildLog) -> Self {
        let id = log
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{}-{}", log.created_at.to_rfc3339(), log.log));
        Self {
            id,
            timestamp: log.created_at,
            source: LogSource::parse(log.stream.as_deref()),
            text: log.log,
        }
    }
}

/// Timestamp of a streamed message, `None` when the server sent garbage
pub fn parse_stream_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

impl From<BuildLogMessage> for LogEntry {
    fn from(msg: BuildLogMessage) -> Self {
        let timestamp = parse_stream_timestamp(&msg.timestamp).unwrap_or_else(Utc::now);
        Self {
            id: format!("{}-{}-{}", msg.build_id, msg.line_number, msg.timestamp),
            timestamp,
            source: LogSource::parse(Some(msg.stream.as_str())),
            text: msg.log,
        }
    }
}

/// The build whose logs are collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub project_id: String,
    pub app_id: String,
    pub build_id: String,
}

/// Receives batches of new log entries
pub type LogSink = mpsc::UnboundedSender<Vec<LogEntry>>;

#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Short name for diagnostics
    fn name(&self) -> &'static str;

    /// Push batches of previously unseen entries into `sink` until `cancel`
    /// fires, the stream ends, or the transport gives up.
    async fn collect(
        &self,
        target: &BuildTarget,
        sink: LogSink,
        cancel: CancelToken,
    ) -> Result<(), CliError>;
}
