//! Wires settings, project config and transports into one deployment run

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use secrecy::SecretString;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::app::options::DeployArgs;
use crate::deploy::executor::{EXIT_CANCELLED, EXIT_FAILURE};
use crate::deploy::{run_deployment, DeployContext, DeployOptions, Report};
use crate::errors::CliError;
use crate::http::client::HttpClient;
use crate::http::BuildApi;
use crate::logs::{init_logging, LogOptions};
use crate::logstream::{LogProvider, PollingLogProvider, StreamingLogProvider, StreamingOptions};
use crate::project::{loader, validator};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{LogTransport, Settings};
use crate::ui::{Reporter, TerminalReporter};
use crate::version::check_for_update;

/// Run `buildship deploy` and return the process exit code
pub async fn deploy(args: DeployArgs, verbose: bool) -> i32 {
    let layout = StorageLayout::from_env();
    let mut settings = match Settings::load(&layout.settings_file()).await {
        Ok(settings) => settings,
        Err(e) => return report_setup_error(&e),
    };
    settings.apply_env_overrides(|key| std::env::var(key).ok());

    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        stderr: verbose,
        log_dir: Some(layout.logs_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let code = match prepare(&args, &settings, &layout).await {
        Ok(ctx) => {
            let reporter: Arc<dyn Reporter> =
                Arc::new(TerminalReporter::new(ctx.config.deployment.name.clone()));
            let outcome = run_deployment(ctx, reporter, forward_interrupts()).await;
            info!(
                "deployment ended in {:?} (build {:?})",
                outcome.stage, outcome.build_id
            );
            if let Some(e) = outcome.error.as_ref().filter(|e| !e.is_silent()) {
                error!("deployment failed: {}", e);
            }
            outcome.exit_code()
        }
        Err(e) => report_setup_error(&e),
    };

    if !settings.skip_version_check {
        notify_update(&settings, &layout).await;
    }
    code
}

async fn prepare(
    args: &DeployArgs,
    settings: &Settings,
    layout: &StorageLayout,
) -> Result<DeployContext, CliError> {
    let project_id = settings.require_project_id()?.to_string();
    let token = settings.require_access_token()?;

    let project_root = args.project_root();
    let mut config = loader::load(&args.config_file)?;
    if let Some(name) = &args.name {
        config.deployment.name = name.clone();
    }
    validator::validate(&mut config, &project_root)?;
    layout.setup().await?;

    let api: Arc<dyn BuildApi> = Arc::new(HttpClient::new(&settings.api_url, token.clone())?);
    let transport = args.log_transport.unwrap_or(settings.log_transport);
    let log_provider = select_log_provider(transport, settings, api.clone(), token)?;

    let options = DeployOptions {
        confirm: !args.disable_confirmation,
        detach: args.detach,
        log_level: args.app_log_level(),
        disable_build_logs: args.disable_build_logs,
        ..Default::default()
    };
    Ok(DeployContext::new(
        api,
        log_provider,
        project_id,
        project_root,
        config,
        &layout.staging_dir(),
        options,
    ))
}

/// Pick the log transport. `Auto` streams whenever a stream URL is configured.
pub fn select_log_provider(
    transport: LogTransport,
    settings: &Settings,
    api: Arc<dyn BuildApi>,
    token: SecretString,
) -> Result<Arc<dyn LogProvider>, CliError> {
    let interval = Duration::from_millis(settings.log_poll_interval_ms);
    match (transport, settings.logstream_url.as_deref()) {
        (LogTransport::Polling, _) | (LogTransport::Auto, None) => {
            Ok(Arc::new(PollingLogProvider::new(api, interval)))
        }
        (LogTransport::Streaming | LogTransport::Auto, Some(url)) => Ok(Arc::new(
            StreamingLogProvider::new(url, token, StreamingOptions::default()),
        )),
        (LogTransport::Streaming, None) => Err(CliError::Configuration(
            "log streaming requested but no `logstream_url` is configured".into(),
        )),
    }
}

fn report_setup_error(err: &CliError) -> i32 {
    if err.is_silent() {
        return EXIT_CANCELLED;
    }
    error!("failed to start deployment: {}", err);
    TerminalReporter::new("").report(&Report::Failed {
        message: err.to_string(),
        hint: err.hint(),
    });
    EXIT_FAILURE
}

/// Forward every SIGINT/SIGTERM into a channel for the running session
pub fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while next_interrupt().await {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next interrupt. Returns `false` if signals cannot be observed.
async fn next_interrupt() -> bool {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received");
                        true
                    }
                    result = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received");
                        result.is_ok()
                    }
                }
            }
            Err(e) => {
                debug!("cannot listen for SIGTERM: {}", e);
                tokio::signal::ctrl_c().await.is_ok()
            }
        }
    }

    #[cfg(not(unix))]
    {
        let received = tokio::signal::ctrl_c().await.is_ok();
        if received {
            info!("Ctrl+C received");
        }
        received
    }
}

async fn notify_update(settings: &Settings, layout: &StorageLayout) {
    let current = env!("CARGO_PKG_VERSION");
    let client = reqwest::Client::new();
    let cache_file = layout.version_cache_file();
    if let Some(latest) =
        check_for_update(&client, &cache_file, current, &settings.release_url).await
    {
        eprintln!(
            "{}",
            format!(
                "A new version of buildship is available: {latest} (you have {current})"
            )
            .yellow()
        );
    }
}
