//! Drives a [`DeploySession`] by turning its effects into tasks

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::deploy::cancel::CancelSource;
use crate::deploy::fsm::{DeploySession, SessionOptions, Stage, Timings};
use crate::deploy::messages::{DeployMessage, Effect};
use crate::deploy::tasks;
use crate::errors::CliError;
use crate::files::archive::ArchiveOptions;
use crate::filesys::dir::Dir;
use crate::http::BuildApi;
use crate::logstream::LogProvider;
use crate::project::ProjectConfig;
use crate::ui::Reporter;
use crate::utils::generate_uuid;

/// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub confirm: bool,
    pub detach: bool,
    /// Log level forwarded to the remote build
    pub log_level: String,
    pub disable_build_logs: bool,
    pub timings: Timings,
    pub archive: ArchiveOptions,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            confirm: true,
            detach: false,
            log_level: "info".to_string(),
            disable_build_logs: false,
            timings: Timings::default(),
            archive: ArchiveOptions::default(),
        }
    }
}

/// Everything the spawned tasks need, shared read-only
pub struct DeployContext {
    pub api: Arc<dyn BuildApi>,
    pub log_provider: Arc<dyn LogProvider>,
    pub project_id: String,
    pub project_root: PathBuf,
    pub config: ProjectConfig,
    /// Body of the create-app request
    pub payload: Value,
    /// Per-run directory holding the archive, removed when the run ends
    pub work_dir: Dir,
    pub options: DeployOptions,
}

impl DeployContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn BuildApi>,
        log_provider: Arc<dyn LogProvider>,
        project_id: impl Into<String>,
        project_root: impl Into<PathBuf>,
        config: ProjectConfig,
        staging: &Dir,
        options: DeployOptions,
    ) -> Self {
        let payload = create_payload(&config, &options);
        Self {
            api,
            log_provider,
            project_id: project_id.into(),
            project_root: project_root.into(),
            config,
            payload,
            work_dir: staging.subdir(&format!("deploy-{}", generate_uuid())),
            options,
        }
    }
}

/// Project payload plus the per-run fields the server expects
pub fn create_payload(config: &ProjectConfig, options: &DeployOptions) -> Value {
    let mut payload = config.to_payload();
    if let Some(map) = payload.as_object_mut() {
        map.insert("logLevel".into(), json!(options.log_level));
        map.insert("disableBuildLogs".into(), json!(options.disable_build_logs));
        map.insert("cliVersion".into(), json!(env!("CARGO_PKG_VERSION")));
    }
    payload
}

/// How a run ended
#[derive(Debug)]
pub struct DeployOutcome {
    pub stage: Stage,
    pub error: Option<CliError>,
    pub build_id: Option<String>,
    pub detached: bool,
}

impl DeployOutcome {
    pub fn exit_code(&self) -> i32 {
        match (&self.stage, &self.error) {
            (Stage::DeploySuccess, _) => EXIT_SUCCESS,
            (_, Some(CliError::UserCancelled)) | (Stage::Cancelled, _) => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Run one deployment to completion.
///
/// Each `()` received on `interrupts` is delivered to the session as an
/// interrupt. The staging directory is removed before returning.
pub async fn run_deployment(
    ctx: DeployContext,
    reporter: Arc<dyn Reporter>,
    mut interrupts: mpsc::UnboundedReceiver<()>,
) -> DeployOutcome {
    let ctx = Arc::new(ctx);
    let (tx, mut rx) = mpsc::unbounded_channel::<DeployMessage>();
    let cancel = CancelSource::new();
    let mut running: Vec<JoinHandle<()>> = Vec::new();

    let mut session = DeploySession::new(SessionOptions {
        confirm: ctx.options.confirm,
        partner: ctx.config.partner().is_some(),
        detach: ctx.options.detach,
        timings: ctx.options.timings,
    });
    info!(
        "deploying {} from {}",
        ctx.config.deployment.name,
        ctx.project_root.display()
    );

    let mut effects: VecDeque<Effect> = session.start().into();
    'run: loop {
        while let Some(effect) = effects.pop_front() {
            match effect {
                Effect::Quit => break 'run,
                Effect::Dispatch(msg) => effects.extend(session.update(msg)),
                Effect::Report(report) => reporter.report(&report),
                Effect::CancelTasks => cancel.cancel(),
                effect => running.extend(spawn(effect, &ctx, &reporter, &cancel, &tx)),
            }
        }
        running.retain(|task| !task.is_finished());

        let msg = tokio::select! {
            Some(msg) = rx.recv() => msg,
            Some(()) = interrupts.recv() => DeployMessage::Interrupted,
            else => DeployMessage::Failed(CliError::Internal("deploy message queue closed".into())),
        };
        effects.extend(session.update(msg));
    }

    cancel.cancel();
    for task in running {
        task.abort();
    }
    ctx.work_dir.delete_best_effort().await;
    debug!("deployment finished in stage {:?}", session.stage());

    DeployOutcome {
        stage: session.stage(),
        build_id: session.build_id().map(str::to_string),
        detached: session.detached(),
        error: session.take_error(),
    }
}

fn spawn(
    effect: Effect,
    ctx: &Arc<DeployContext>,
    reporter: &Arc<dyn Reporter>,
    cancel: &CancelSource,
    tx: &tasks::MessageSender,
) -> Option<JoinHandle<()>> {
    let ctx = ctx.clone();
    let tx = tx.clone();
    let token = cancel.token();
    let task = match effect {
        Effect::PromptConfirmation => tasks::prompt_confirmation(ctx, reporter.clone(), tx),
        Effect::LoadFiles => tasks::load_files(ctx, tx),
        Effect::CreateArchive { files } => tasks::create_archive_task(ctx, files, tx),
        Effect::CreateApp { partner } => tasks::create_app(ctx, partner, token, tx),
        Effect::UploadArchive {
            path,
            upload_url,
            progress,
        } => tasks::upload_archive(ctx, path, upload_url, progress, token, tx),
        Effect::ScheduleUploadTick(delay) => {
            tasks::schedule(delay, DeployMessage::UploadTick, token, tx)
        }
        Effect::StartLogSupervision { build_id } => {
            tasks::supervise_logs(ctx, build_id, token, tx)
        }
        Effect::PollBuildStatus { build_id, delay } => {
            tasks::poll_build_status(ctx, build_id, delay, token, tx)
        }
        Effect::ScheduleDrain { status, delay } => {
            tasks::schedule(delay, DeployMessage::LogDrainComplete(status), token, tx)
        }
        Effect::CancelBuild { build_id } => {
            let timeout = ctx.options.timings.cancel_timeout;
            tasks::cancel_build(ctx, build_id, timeout, tx)
        }
        other => {
            debug!("{:?} is not a task", other);
            return None;
        }
    };
    Some(task)
}
