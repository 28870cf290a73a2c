//! One spawned task per effect. Each reports back through the session queue.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::deploy::cancel::CancelToken;
use crate::deploy::executor::DeployContext;
use crate::deploy::messages::DeployMessage;
use crate::files::archive::create_archive;
use crate::files::dependencies::generate_dependency_files;
use crate::files::include::determine_included_files;
use crate::filesys::file::File;
use crate::http::app_id;
use crate::logstream::BuildTarget;
use crate::ui::{summary::render_summary, Reporter};
use crate::upload::UploadProgress;

/// Name of the archive inside the per-run staging directory
pub const ARCHIVE_NAME: &str = "app.zip";

pub type MessageSender = mpsc::UnboundedSender<DeployMessage>;

fn send(tx: &MessageSender, msg: DeployMessage) {
    if tx.send(msg).is_err() {
        debug!("deploy session is gone, dropping message");
    }
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<F: Future>(cancel: &CancelToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

pub fn prompt_confirmation(
    ctx: Arc<DeployContext>,
    reporter: Arc<dyn Reporter>,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let summary = render_summary(&ctx.config, &ctx.project_id);
        let confirmed = tokio::task::spawn_blocking(move || reporter.confirm(&summary)).await;
        let msg = match confirmed {
            Ok(true) => DeployMessage::Confirmed,
            Ok(false) => DeployMessage::Declined,
            Err(e) => DeployMessage::Failed(e.into()),
        };
        send(&tx, msg);
    })
}

pub fn load_files(ctx: Arc<DeployContext>, tx: MessageSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let walk_ctx = ctx.clone();
        let result = tokio::task::spawn_blocking(move || {
            let deployment = &walk_ctx.config.deployment;
            determine_included_files(
                &walk_ctx.project_root,
                deployment.include.as_slice(),
                deployment.exclude.as_slice(),
            )
        })
        .await;
        let msg = match result {
            Ok(Ok(files)) => {
                info!("{} files selected for deployment", files.len());
                DeployMessage::FilesLoaded(files)
            }
            Ok(Err(e)) => DeployMessage::Failed(e),
            Err(e) => DeployMessage::Failed(e.into()),
        };
        send(&tx, msg);
    })
}

pub fn create_archive_task(
    ctx: Arc<DeployContext>,
    files: Vec<String>,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let dest = ctx.work_dir.path().join(ARCHIVE_NAME);
        let job_ctx = ctx.clone();
        let job_dest = dest.clone();
        let result = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(job_ctx.work_dir.path())?;
            let dep_files = generate_dependency_files(&job_ctx.config, &job_ctx.project_root)?;
            create_archive(
                &job_ctx.project_root,
                &files,
                &dep_files,
                &job_dest,
                &job_ctx.options.archive,
            )
        })
        .await;
        let msg = match result {
            Ok(Ok(summary)) => {
                info!(
                    "archived {} entries ({} bytes uncompressed) into {} bytes",
                    summary.entries, summary.uncompressed_bytes, summary.size
                );
                DeployMessage::Archived {
                    path: summary.path,
                    size: summary.size,
                }
            }
            Ok(Err(e)) => DeployMessage::Failed(e),
            Err(e) => DeployMessage::Failed(e.into()),
        };
        send(&tx, msg);
    })
}

pub fn create_app(
    ctx: Arc<DeployContext>,
    partner: bool,
    cancel: CancelToken,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let call = async {
            if partner {
                ctx.api.create_partner_app(&ctx.project_id, &ctx.payload).await
            } else {
                ctx.api.create_app(&ctx.project_id, &ctx.payload).await
            }
        };
        match until_cancelled(&cancel, call).await {
            Some(Ok(app)) => {
                info!("created build {}", app.build_id);
                send(&tx, DeployMessage::AppCreated(app));
            }
            Some(Err(e)) => send(&tx, DeployMessage::Failed(e)),
            None => debug!("app creation abandoned"),
        }
    })
}

pub fn upload_archive(
    ctx: Arc<DeployContext>,
    path: PathBuf,
    upload_url: String,
    progress: Arc<UploadProgress>,
    cancel: CancelToken,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = until_cancelled(
            &cancel,
            ctx.api.upload_archive(&upload_url, &path, progress),
        )
        .await;
        File::new(&path).delete_best_effort().await;
        match result {
            Some(Ok(())) => send(&tx, DeployMessage::Uploaded),
            Some(Err(e)) => send(&tx, DeployMessage::Failed(e)),
            None => debug!("upload abandoned"),
        }
    })
}

/// Fire `msg` after `delay` unless cancelled
pub fn schedule(
    delay: Duration,
    msg: DeployMessage,
    cancel: CancelToken,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if cancel.sleep(delay).await {
            send(&tx, msg);
        }
    })
}

pub fn poll_build_status(
    ctx: Arc<DeployContext>,
    build_id: String,
    delay: Duration,
    cancel: CancelToken,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !delay.is_zero() && !cancel.sleep(delay).await {
            return;
        }
        let app_id = app_id(&ctx.project_id, &ctx.config.deployment.name);
        let call = ctx.api.get_build(&ctx.project_id, &app_id, &build_id);
        match until_cancelled(&cancel, call).await {
            Some(Ok(build)) => send(&tx, DeployMessage::BuildStatus(build.status)),
            Some(Err(e)) => send(&tx, DeployMessage::BuildStatusPollFailed(e.to_string())),
            None => {}
        }
    })
}

/// Run the log provider and forward its batches to the session
pub fn supervise_logs(
    ctx: Arc<DeployContext>,
    build_id: String,
    cancel: CancelToken,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if ctx.options.disable_build_logs {
            debug!("build logs disabled, not collecting");
            return;
        }
        let target = BuildTarget {
            project_id: ctx.project_id.clone(),
            app_id: app_id(&ctx.project_id, &ctx.config.deployment.name),
            build_id,
        };
        let provider = ctx.log_provider.clone();
        info!("collecting build logs with the {} provider", provider.name());

        let (log_tx, mut log_rx) = mpsc::unbounded_channel();
        let collect = provider.collect(&target, log_tx, cancel.clone());
        tokio::pin!(collect);

        let result = loop {
            tokio::select! {
                result = &mut collect => break result,
                Some(batch) = log_rx.recv() => send(&tx, DeployMessage::Logs(batch)),
            }
        };
        // batches sent right before the provider returned
        while let Ok(batch) = log_rx.try_recv() {
            send(&tx, DeployMessage::Logs(batch));
        }

        if cancel.is_cancelled() {
            return;
        }
        let reason = match result {
            Ok(()) => None,
            Err(e) => {
                warn!("log provider {} failed: {}", provider.name(), e);
                Some(e.to_string())
            }
        };
        send(&tx, DeployMessage::LogStreamEnded(reason));
    })
}

/// Ask the server to stop the build. Deliberately not tied to the cancel
/// token, which has already fired by the time this runs.
pub fn cancel_build(
    ctx: Arc<DeployContext>,
    build_id: String,
    timeout: Duration,
    tx: MessageSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app_id = app_id(&ctx.project_id, &ctx.config.deployment.name);
        let call = ctx.api.cancel_build(&ctx.project_id, &app_id, &build_id);
        let cancel_error = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("no answer within {}s", timeout.as_secs())),
        };
        send(&tx, DeployMessage::BuildCancelled { cancel_error });
    })
}
