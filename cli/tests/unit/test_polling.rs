use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use buildship::deploy::cancel::CancelSource;
use buildship::errors::CliError;
use buildship::http::BuildApi;
use buildship::logstream::{BuildTarget, LogProvider, PollingLogProvider};
use buildship::upload::UploadProgress;
use chrono::{DateTime, Utc};
use openapi_client::{AppBuild, BuildLog, BuildLogsResponse, CreateAppResponse};
use serde_json::Value;
use tokio::sync::mpsc;

/// Answers log fetches from a script, repeating the last answer
struct ScriptedLogs {
    answers: Mutex<VecDeque<Result<Vec<BuildLog>, CliError>>>,
    last: Mutex<Vec<BuildLog>>,
}

impl ScriptedLogs {
    fn new(answers: Vec<Result<Vec<BuildLog>, CliError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(Vec::new()),
        }
    }
}

fn log(id: &str, second: u32, text: &str) -> BuildLog {
    let created_at: DateTime<Utc> = format!("2024-01-01T00:00:0{second}Z").parse().unwrap();
    BuildLog {
        id: Some(id.to_string()),
        created_at,
        log: text.to_string(),
        stream: Some("stdout".into()),
    }
}

#[async_trait]
impl BuildApi for ScriptedLogs {
    async fn create_app(&self, _: &str, _: &Value) -> Result<CreateAppResponse, CliError> {
        unimplemented!()
    }

    async fn create_partner_app(&self, _: &str, _: &Value) -> Result<CreateAppResponse, CliError> {
        unimplemented!()
    }

    async fn upload_archive(
        &self,
        _: &str,
        _: &Path,
        _: Arc<UploadProgress>,
    ) -> Result<(), CliError> {
        unimplemented!()
    }

    async fn get_build(&self, _: &str, _: &str, _: &str) -> Result<AppBuild, CliError> {
        unimplemented!()
    }

    async fn fetch_build_logs(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<BuildLogsResponse, CliError> {
        assert_eq!((project_id, app_id, build_id), ("p-1", "p-1-app", "b-1"));
        let next = self.answers.lock().unwrap().pop_front();
        let logs = match next {
            Some(Ok(logs)) => {
                *self.last.lock().unwrap() = logs.clone();
                logs
            }
            Some(Err(e)) => return Err(e),
            None => self.last.lock().unwrap().clone(),
        };
        Ok(BuildLogsResponse {
            logs,
            status: "building".into(),
        })
    }

    async fn cancel_build(&self, _: &str, _: &str, _: &str) -> Result<(), CliError> {
        unimplemented!()
    }
}

fn target() -> BuildTarget {
    BuildTarget {
        project_id: "p-1".into(),
        app_id: "p-1-app".into(),
        build_id: "b-1".into(),
    }
}

#[tokio::test]
async fn test_polling_forwards_only_new_lines_and_survives_errors() {
    let api = Arc::new(ScriptedLogs::new(vec![
        Ok(vec![log("1", 1, "one")]),
        Err(CliError::api_status(502, "bad gateway")),
        Ok(vec![log("1", 1, "one"), log("2", 2, "two")]),
    ]));
    let provider = PollingLogProvider::new(api, Duration::from_millis(5));
    let source = CancelSource::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let token = source.token();
    let collect = tokio::spawn(async move { provider.collect(&target(), tx, token).await });

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    source.cancel();
    assert!(collect.await.unwrap().is_ok());

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].text, "one");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].text, "two");
    // repeated history after the script ran out produced nothing new
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_polling_stops_when_sink_is_dropped() {
    let api = Arc::new(ScriptedLogs::new(vec![Ok(vec![log("1", 1, "one")])]));
    let provider = PollingLogProvider::new(api, Duration::from_millis(5));
    let source = CancelSource::new();
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        provider.collect(&target(), tx, source.token()),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
}
