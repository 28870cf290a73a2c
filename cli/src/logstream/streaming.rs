//! Log provider backed by the build log websocket

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use openapi_client::BuildLogMessage;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::deploy::cancel::CancelToken;
use crate::errors::CliError;
use crate::logstream::{parse_stream_timestamp, BuildTarget, LogEntry, LogProvider, LogSink};

/// Streaming provider options
#[derive(Debug, Clone)]
pub struct StreamingOptions {
    /// Delay between reconnection attempts
    pub reconnect_delay: Duration,

    /// Consecutive failed connections tolerated before giving up
    pub max_reconnect_attempts: u32,

    /// Ping interval
    pub ping_interval: Duration,

    /// Extra time allowed for a pong on top of the ping interval
    pub pong_timeout: Duration,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(2),
            max_reconnect_attempts: 5,
            ping_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
        }
    }
}

pub struct StreamingLogProvider {
    base_url: String,
    token: SecretString,
    options: StreamingOptions,
}

/// Collection progress carried across reconnects
#[derive(Default)]
struct ResumeState {
    seen: HashSet<String>,
    last_timestamp: Option<DateTime<Utc>>,
    attempts: u32,
}

impl ResumeState {
    /// Record a received message, returning its entry unless it was seen before
    fn accept(&mut self, message: BuildLogMessage) -> Option<LogEntry> {
        self.attempts = 0;
        // resuming from a made-up timestamp could skip lines never received
        match parse_stream_timestamp(&message.timestamp) {
            Some(ts) if self.last_timestamp.is_none_or(|last| ts > last) => {
                self.last_timestamp = Some(ts);
            }
            Some(_) => {}
            None => warn!("log line {} has an unreadable timestamp", message.line_number),
        }
        let entry = LogEntry::from(message);
        self.seen.insert(entry.id.clone()).then_some(entry)
    }
}

enum SessionEnd {
    Closed,
    Cancelled,
    SinkGone,
}

impl StreamingLogProvider {
    pub fn new(base_url: &str, token: SecretString, options: StreamingOptions) -> Self {
        Self {
            base_url: base_url.to_string(),
            token,
            options,
        }
    }

    async fn stream_once(
        &self,
        target: &BuildTarget,
        sink: &LogSink,
        cancel: &CancelToken,
        state: &mut ResumeState,
    ) -> Result<SessionEnd, CliError> {
        let url = build_stream_url(
            &self.base_url,
            target,
            self.token.expose_secret(),
            state.last_timestamp,
        )?;
        let (mut ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| CliError::api(format!("websocket connect failed: {e}")))?;
        info!("connected to build log stream for {}", target.build_id);

        let read_timeout = self.options.ping_interval + self.options.pong_timeout;
        let mut ping_tick = tokio::time::interval(self.options.ping_interval);
        ping_tick.tick().await;
        // only incoming frames (pongs included) push the deadline out
        let read_deadline = tokio::time::sleep(read_timeout);
        tokio::pin!(read_deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = ws_stream.close(None).await;
                    return Ok(SessionEnd::Cancelled);
                }
                _ = &mut read_deadline => {
                    return Err(CliError::api(format!("no data for {:?}", read_timeout)));
                }
                _ = ping_tick.tick() => {
                    ws_stream
                        .send(Message::Ping(Vec::new().into()))
                        .await
                        .map_err(|e| CliError::api(format!("failed to send ping: {e}")))?;
                }
                msg = ws_stream.next() => {
                    read_deadline.as_mut().reset(Instant::now() + read_timeout);
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let message: BuildLogMessage = match serde_json::from_str(&text) {
                                Ok(m) => m,
                                Err(e) => {
                                    warn!("failed to parse log message: {}", e);
                                    continue;
                                }
                            };
                            if let Some(entry) = state.accept(message) {
                                if sink.send(vec![entry]).is_err() {
                                    let _ = ws_stream.close(None).await;
                                    return Ok(SessionEnd::SinkGone);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.as_ref().map(|f| f.code);
                            return match code {
                                None | Some(CloseCode::Normal) | Some(CloseCode::Away) => {
                                    debug!("log stream closed normally");
                                    Ok(SessionEnd::Closed)
                                }
                                Some(code) => Err(CliError::api(format!("log stream closed with {code}"))),
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(CliError::api(format!("log stream error: {e}")));
                        }
                        None => {
                            return Err(CliError::api("log stream ended without a close frame"));
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl LogProvider for StreamingLogProvider {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn collect(
        &self,
        target: &BuildTarget,
        sink: LogSink,
        cancel: CancelToken,
    ) -> Result<(), CliError> {
        let mut state = ResumeState::default();

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let err = match self.stream_once(target, &sink, &cancel, &mut state).await {
                Ok(SessionEnd::Closed) | Ok(SessionEnd::Cancelled) | Ok(SessionEnd::SinkGone) => {
                    return Ok(())
                }
                Err(e) => e,
            };

            state.attempts += 1;
            if state.attempts > self.options.max_reconnect_attempts {
                return Err(CliError::api(format!(
                    "max reconnection attempts ({}) exceeded: {}",
                    self.options.max_reconnect_attempts, err
                )));
            }
            warn!(
                "log stream lost ({}), reconnecting {}/{}",
                err, state.attempts, self.options.max_reconnect_attempts
            );
            if !cancel.sleep(self.options.reconnect_delay).await {
                return Ok(());
            }
        }
    }
}

/// `{base}/ws-build-logs?projectID=..&buildID=..&token=..[&after=..]`
pub fn build_stream_url(
    base_url: &str,
    target: &BuildTarget,
    token: &str,
    after: Option<DateTime<Utc>>,
) -> Result<Url, CliError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| CliError::Configuration(format!("invalid logstream URL: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(CliError::Configuration(format!(
                "unsupported logstream URL scheme '{other}'"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| CliError::Configuration("failed to set logstream URL scheme".into()))?;
    url.set_path(&format!("{}/ws-build-logs", url.path().trim_end_matches('/')));

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.append_pair("projectID", &target.project_id);
        query.append_pair("buildID", &target.build_id);
        query.append_pair("token", token);
        if let Some(after) = after {
            query.append_pair("after", &after.to_rfc3339_opts(SecondsFormat::Nanos, true));
        }
    }
    Ok(url)
}
