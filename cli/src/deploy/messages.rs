//! Messages consumed by the deploy session and the effects it asks for

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use openapi_client::CreateAppResponse;

use crate::errors::CliError;
use crate::logstream::LogEntry;
use crate::upload::{ProgressSnapshot, UploadProgress};

/// Input to [`DeploySession::update`](super::fsm::DeploySession::update).
///
/// Every spawned task answers with exactly one of these, except log
/// supervision which sends `Logs` repeatedly and then `LogStreamEnded`.
#[derive(Debug)]
pub enum DeployMessage {
    Confirmed,
    Declined,
    FilesLoaded(Vec<String>),
    Archived { path: PathBuf, size: u64 },
    AppCreated(CreateAppResponse),
    UploadTick,
    Uploaded,
    BuildStatus(String),
    BuildStatusPollFailed(String),
    BuildComplete(String),
    LogDrainComplete(String),
    Logs(Vec<LogEntry>),
    /// The provider stopped, with the error that stopped it if any
    LogStreamEnded(Option<String>),
    /// Keyboard interrupt or termination signal
    Interrupted,
    BuildCancelled { cancel_error: Option<String> },
    Failed(CliError),
}

/// Work the executor performs on behalf of the session
#[derive(Debug)]
pub enum Effect {
    PromptConfirmation,
    LoadFiles,
    CreateArchive {
        files: Vec<String>,
    },
    CreateApp {
        partner: bool,
    },
    UploadArchive {
        path: PathBuf,
        upload_url: String,
        progress: Arc<UploadProgress>,
    },
    ScheduleUploadTick(Duration),
    StartLogSupervision {
        build_id: String,
    },
    PollBuildStatus {
        build_id: String,
        delay: Duration,
    },
    ScheduleDrain {
        status: String,
        delay: Duration,
    },
    /// Feed a message straight back into the session
    Dispatch(DeployMessage),
    /// Ask the server to stop the build. Runs outside the cancel token.
    CancelBuild {
        build_id: String,
    },
    /// Fire the cancel token for every outstanding task
    CancelTasks,
    Report(Report),
    Quit,
}

/// Something the user should see
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    FilesLoaded {
        count: usize,
    },
    DevFolders(Vec<String>),
    Archived {
        size: u64,
    },
    Warning(String),
    AppCreated {
        build_id: String,
    },
    UploadStarted {
        size: u64,
    },
    UploadProgress(ProgressSnapshot),
    Uploaded(ProgressSnapshot),
    BuildStatus(String),
    LogLines(Vec<LogEntry>),
    Draining,
    Cancelling {
        build_id: String,
    },
    Success {
        build_id: String,
        dashboard_url: String,
        endpoint: String,
        detached: bool,
    },
    Failed {
        message: String,
        hint: Option<&'static str>,
    },
    Cancelled {
        warning: Option<String>,
    },
}
