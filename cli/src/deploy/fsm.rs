//! Deployment state machine
//!
//! [`DeploySession`] is a pure reducer: it consumes one [`DeployMessage`] at a
//! time and answers with the [`Effect`]s the executor must perform. The only
//! outside state it ever reads is the shared upload counter.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use openapi_client::CreateAppResponse;
use tracing::{debug, info, warn};

use crate::deploy::messages::{DeployMessage, Effect, Report};
use crate::errors::CliError;
use crate::files::archive::validate_archive_size;
use crate::files::include::detect_dev_folders;
use crate::logstream::{LogBuffer, LogEntry};
use crate::upload::{ProgressSampler, UploadProgress};

/// Build statuses after which the server does no more work
pub const TERMINAL_STATUSES: [&str; 7] = [
    "success",
    "build_failure",
    "init_failure",
    "ready",
    "failure",
    "cancelled",
    "init_timeout",
];

pub fn is_terminal_status(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

pub fn is_success_status(status: &str) -> bool {
    matches!(status, "success" | "ready")
}

/// Deployment stage, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Confirmation,
    LoadingFiles,
    ZippingFiles,
    CreatingApp,
    UploadingZip,
    BuildingApp,
    DrainingLogs,
    Cancelling,
    Cancelled,
    DeploySuccess,
    DeployError,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::Cancelled | Stage::DeploySuccess | Stage::DeployError
        )
    }
}

/// Delays used by the session and its executor
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub status_poll_interval: Duration,
    pub drain_delay: Duration,
    pub upload_tick: Duration,
    pub cancel_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_secs(1),
            drain_delay: Duration::from_secs(2),
            upload_tick: Duration::from_millis(10),
            cancel_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Ask before doing anything
    pub confirm: bool,
    /// Partner runtimes build remotely with no local payload
    pub partner: bool,
    /// Stop once the build has been handed off
    pub detach: bool,
    pub timings: Timings,
}

pub struct DeploySession {
    options: SessionOptions,
    stage: Stage,
    files: Vec<String>,
    archive_path: Option<PathBuf>,
    archive_size: u64,
    app: Option<CreateAppResponse>,
    build_id: Option<String>,
    build_status: Option<String>,
    sampler: Option<ProgressSampler>,
    last_reported_decile: u8,
    uploaded_bytes: u64,
    logs: LogBuffer,
    error: Option<CliError>,
    error_displayed: bool,
    detached: bool,
}

impl DeploySession {
    pub fn new(options: SessionOptions) -> Self {
        let stage = if options.confirm {
            Stage::Confirmation
        } else if options.partner {
            Stage::CreatingApp
        } else {
            Stage::LoadingFiles
        };
        Self {
            options,
            stage,
            files: Vec::new(),
            archive_path: None,
            archive_size: 0,
            app: None,
            build_id: None,
            build_status: None,
            sampler: None,
            last_reported_decile: 0,
            uploaded_bytes: 0,
            logs: LogBuffer::default(),
            error: None,
            error_displayed: false,
            detached: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn archive_path(&self) -> Option<&PathBuf> {
        self.archive_path.as_ref()
    }

    pub fn archive_size(&self) -> u64 {
        self.archive_size
    }

    pub fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref()
    }

    pub fn build_status(&self) -> Option<&str> {
        self.build_status.as_deref()
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn error(&self) -> Option<&CliError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<CliError> {
        self.error.take()
    }

    pub fn error_displayed(&self) -> bool {
        self.error_displayed
    }

    pub fn detached(&self) -> bool {
        self.detached
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Effects for the first step of the pipeline
    pub fn start(&mut self) -> Vec<Effect> {
        match self.stage {
            Stage::Confirmation => vec![Effect::PromptConfirmation],
            _ => self.begin(),
        }
    }

    /// Apply one message. Terminal stages ignore everything.
    pub fn update(&mut self, msg: DeployMessage) -> Vec<Effect> {
        if self.stage.is_terminal() {
            debug!("ignoring {:?} after the session finished", msg);
            return Vec::new();
        }

        match msg {
            DeployMessage::Interrupted => self.on_interrupt(),
            // tasks stopped by the interrupt may still report their own failure
            DeployMessage::Failed(err) if self.stage == Stage::Cancelling => {
                debug!("ignoring failure while cancelling: {}", err);
                Vec::new()
            }
            DeployMessage::Failed(err) => self.fail(err),
            DeployMessage::Logs(batch) => {
                self.logs.extend(batch);
                let released = self.logs.release();
                log_lines(released).into_iter().collect()
            }
            DeployMessage::LogStreamEnded(reason) => {
                let mut effects: Vec<Effect> = log_lines(self.logs.flush()).into_iter().collect();
                if let Some(reason) = reason {
                    warn!("build log stream stopped: {}", reason);
                    effects.push(Effect::Report(Report::Warning(format!(
                        "Build logs are no longer being received: {reason}"
                    ))));
                }
                effects
            }
            msg => self.advance(msg),
        }
    }

    fn advance(&mut self, msg: DeployMessage) -> Vec<Effect> {
        match (self.stage, msg) {
            (Stage::Confirmation, DeployMessage::Confirmed) => {
                self.stage = if self.options.partner {
                    Stage::CreatingApp
                } else {
                    Stage::LoadingFiles
                };
                self.begin()
            }
            (Stage::Confirmation, DeployMessage::Declined) => self.cancelled(None),

            (Stage::LoadingFiles, DeployMessage::FilesLoaded(files)) => self.on_files(files),

            (Stage::ZippingFiles, DeployMessage::Archived { path, size }) => {
                self.on_archived(path, size)
            }

            (Stage::CreatingApp, DeployMessage::AppCreated(app)) => self.on_app_created(app),

            (Stage::UploadingZip, DeployMessage::UploadTick) => self.on_upload_tick(),
            (Stage::UploadingZip, DeployMessage::Uploaded) => self.on_uploaded(),

            (Stage::BuildingApp, DeployMessage::BuildStatus(status)) => self.on_status(status),
            (Stage::BuildingApp, DeployMessage::BuildStatusPollFailed(err)) => {
                debug!("build status poll failed, retrying: {}", err);
                self.poll_status(self.options.timings.status_poll_interval)
            }
            (Stage::BuildingApp, DeployMessage::BuildComplete(status)) => {
                info!("build reached terminal status {}", status);
                self.stage = Stage::DrainingLogs;
                vec![
                    Effect::Report(Report::Draining),
                    Effect::ScheduleDrain {
                        status,
                        delay: self.options.timings.drain_delay,
                    },
                ]
            }

            (Stage::DrainingLogs, DeployMessage::LogDrainComplete(status)) => {
                self.on_drained(status)
            }

            (Stage::Cancelling, DeployMessage::BuildCancelled { cancel_error }) => {
                let warning = cancel_error.map(|e| {
                    format!(
                        "Failed to cancel build {}: {e}",
                        self.build_id.as_deref().unwrap_or_default()
                    )
                });
                self.cancelled(warning)
            }

            (stage, msg) => {
                debug!("ignoring {:?} in stage {:?}", msg, stage);
                Vec::new()
            }
        }
    }

    fn begin(&mut self) -> Vec<Effect> {
        match self.stage {
            Stage::CreatingApp => vec![Effect::CreateApp { partner: true }],
            _ => vec![Effect::LoadFiles],
        }
    }

    fn on_files(&mut self, files: Vec<String>) -> Vec<Effect> {
        if files.is_empty() {
            return self.fail(CliError::FileSystem(
                "no files to deploy, check the include and exclude patterns".into(),
            ));
        }

        let mut effects = vec![Effect::Report(Report::FilesLoaded { count: files.len() })];
        let dev_folders = detect_dev_folders(&files);
        if !dev_folders.is_empty() {
            effects.push(Effect::Report(Report::DevFolders(dev_folders)));
        }
        effects.push(Effect::CreateArchive {
            files: files.clone(),
        });
        self.files = files;
        self.stage = Stage::ZippingFiles;
        effects
    }

    fn on_archived(&mut self, path: PathBuf, size: u64) -> Vec<Effect> {
        self.archive_path = Some(path);
        self.archive_size = size;

        let warning = match validate_archive_size(size) {
            Ok(warning) => warning,
            Err(err) => return self.fail(err),
        };
        let mut effects = vec![Effect::Report(Report::Archived { size })];
        if let Some(warning) = warning {
            effects.push(Effect::Report(Report::Warning(warning)));
        }
        effects.push(Effect::CreateApp { partner: false });
        self.stage = Stage::CreatingApp;
        effects
    }

    fn on_app_created(&mut self, app: CreateAppResponse) -> Vec<Effect> {
        if app.build_id.is_empty() {
            return self.fail(CliError::api("create app response carried no build id"));
        }
        if !self.options.partner && app.upload_url.is_empty() {
            return self.fail(CliError::api("create app response carried no upload URL"));
        }

        let build_id = app.build_id.clone();
        let upload_url = app.upload_url.clone();
        self.build_id = Some(build_id.clone());
        if !app.status.is_empty() {
            self.build_status = Some(app.status.clone());
        }
        self.app = Some(app);

        let mut effects = vec![Effect::Report(Report::AppCreated {
            build_id: build_id.clone(),
        })];

        if self.options.partner {
            if self.options.detach {
                effects.extend(self.succeed(true));
            } else {
                effects.extend(self.begin_build(build_id));
            }
            return effects;
        }

        let Some(path) = self.archive_path.clone() else {
            return self.fail(CliError::Internal("no archive to upload".into()));
        };
        let progress = Arc::new(UploadProgress::new(self.archive_size));
        self.sampler = Some(ProgressSampler::new(progress.clone()));
        self.last_reported_decile = 0;
        self.stage = Stage::UploadingZip;
        effects.push(Effect::Report(Report::UploadStarted {
            size: self.archive_size,
        }));
        effects.push(Effect::UploadArchive {
            path,
            upload_url,
            progress,
        });
        effects.push(Effect::ScheduleUploadTick(self.options.timings.upload_tick));
        effects
    }

    fn on_upload_tick(&mut self) -> Vec<Effect> {
        let Some(sampler) = self.sampler.as_mut() else {
            return Vec::new();
        };
        let snapshot = sampler.sample();
        self.uploaded_bytes = self.uploaded_bytes.max(snapshot.bytes_sent);

        let mut effects = Vec::new();
        let decile = snapshot.percent() / 10 * 10;
        if decile > self.last_reported_decile && decile < 100 {
            self.last_reported_decile = decile;
            effects.push(Effect::Report(Report::UploadProgress(snapshot)));
        }
        effects.push(Effect::ScheduleUploadTick(self.options.timings.upload_tick));
        effects
    }

    fn on_uploaded(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(sampler) = self.sampler.as_mut() {
            let snapshot = sampler.complete();
            self.uploaded_bytes = snapshot.total;
            self.last_reported_decile = 100;
            effects.push(Effect::Report(Report::Uploaded(snapshot)));
        }
        // removed by the upload task
        self.archive_path = None;

        let Some(build_id) = self.build_id.clone() else {
            return self.fail(CliError::Internal("upload finished without a build".into()));
        };
        if self.options.detach {
            effects.extend(self.succeed(true));
        } else {
            effects.extend(self.begin_build(build_id));
        }
        effects
    }

    fn begin_build(&mut self, build_id: String) -> Vec<Effect> {
        self.stage = Stage::BuildingApp;
        vec![
            Effect::StartLogSupervision {
                build_id: build_id.clone(),
            },
            Effect::PollBuildStatus {
                build_id,
                delay: Duration::ZERO,
            },
        ]
    }

    fn poll_status(&self, delay: Duration) -> Vec<Effect> {
        match &self.build_id {
            Some(build_id) => vec![Effect::PollBuildStatus {
                build_id: build_id.clone(),
                delay,
            }],
            None => Vec::new(),
        }
    }

    fn on_status(&mut self, status: String) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.build_status.as_deref() != Some(status.as_str()) {
            debug!("build status changed to {}", status);
            effects.push(Effect::Report(Report::BuildStatus(status.clone())));
            self.build_status = Some(status.clone());
        }
        if is_terminal_status(&status) {
            effects.push(Effect::Dispatch(DeployMessage::BuildComplete(status)));
        } else {
            effects.extend(self.poll_status(self.options.timings.status_poll_interval));
        }
        effects
    }

    fn on_drained(&mut self, status: String) -> Vec<Effect> {
        if is_success_status(&status) {
            return self.succeed(false);
        }
        self.fail(CliError::api(format!("build finished with status {status}")))
    }

    fn on_interrupt(&mut self) -> Vec<Effect> {
        match (self.stage, self.build_id.clone()) {
            (Stage::Cancelling, _) => {
                info!("second interrupt, exiting without waiting for the cancel request");
                self.cancelled(Some(
                    "Exited before the build cancellation was confirmed".into(),
                ))
            }
            (_, Some(build_id)) => {
                info!("cancelling build {}", build_id);
                self.stage = Stage::Cancelling;
                vec![
                    Effect::CancelTasks,
                    Effect::Report(Report::Cancelling {
                        build_id: build_id.clone(),
                    }),
                    Effect::CancelBuild { build_id },
                ]
            }
            (_, None) => self.cancelled(None),
        }
    }

    fn succeed(&mut self, detached: bool) -> Vec<Effect> {
        self.stage = Stage::DeploySuccess;
        self.detached = detached;
        let (dashboard_url, endpoint) = self
            .app
            .as_ref()
            .map(|app| (app.dashboard_url.clone(), app.internal_endpoint.clone()))
            .unwrap_or_default();
        let mut effects = self.finish();
        effects.extend([
            Effect::Report(Report::Success {
                build_id: self.build_id.clone().unwrap_or_default(),
                dashboard_url,
                endpoint,
                detached,
            }),
            Effect::Quit,
        ]);
        effects
    }

    /// Stop outstanding tasks and print whatever log lines were held back
    fn finish(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::CancelTasks];
        effects.extend(log_lines(self.logs.flush()));
        effects
    }

    fn cancelled(&mut self, warning: Option<String>) -> Vec<Effect> {
        self.stage = Stage::Cancelled;
        self.error = Some(CliError::UserCancelled);
        let mut effects = self.finish();
        effects.extend([Effect::Report(Report::Cancelled { warning }), Effect::Quit]);
        effects
    }

    fn fail(&mut self, err: CliError) -> Vec<Effect> {
        if err.is_silent() {
            return self.cancelled(None);
        }
        warn!("deployment failed in stage {:?}: {}", self.stage, err);
        self.stage = Stage::DeployError;
        self.error_displayed = true;
        let report = Report::Failed {
            message: err.to_string(),
            hint: err.hint(),
        };
        self.error = Some(err);
        let mut effects = self.finish();
        effects.extend([Effect::Report(report), Effect::Quit]);
        effects
    }
}

fn log_lines(entries: Vec<LogEntry>) -> Option<Effect> {
    (!entries.is_empty()).then(|| Effect::Report(Report::LogLines(entries)))
}
