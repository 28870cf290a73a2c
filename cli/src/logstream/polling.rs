//! Log provider that re-fetches the build's log history on an interval

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::deploy::cancel::CancelToken;
use crate::errors::CliError;
use crate::http::BuildApi;
use crate::logstream::{BuildTarget, LogEntry, LogProvider, LogSink};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct PollingLogProvider {
    api: Arc<dyn BuildApi>,
    interval: Duration,
}

impl PollingLogProvider {
    pub fn new(api: Arc<dyn BuildApi>, interval: Duration) -> Self {
        Self { api, interval }
    }
}

#[async_trait]
impl LogProvider for PollingLogProvider {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn collect(
        &self,
        target: &BuildTarget,
        sink: LogSink,
        cancel: CancelToken,
    ) -> Result<(), CliError> {
        info!("polling build logs for {} every {:?}", target.build_id, self.interval);
        let mut seen = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self
                .api
                .fetch_build_logs(&target.project_id, &target.app_id, &target.build_id)
                .await
            {
                Ok(response) => {
                    let fresh: Vec<LogEntry> = response
                        .logs
                        .into_iter()
                        .map(LogEntry::from)
                        .filter(|entry| seen.insert(entry.id.clone()))
                        .collect();
                    if !fresh.is_empty() {
                        debug!("received {} new log lines", fresh.len());
                        if sink.send(fresh).is_err() {
                            debug!("log sink closed, stopping");
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("failed to fetch build logs, retrying: {}", e);
                }
            }

            if !cancel.sleep(self.interval).await {
                break;
            }
        }

        info!("stopped polling build logs for {}", target.build_id);
        Ok(())
    }
}
