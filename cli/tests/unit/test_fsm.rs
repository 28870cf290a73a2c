//! Deploy session unit tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use buildship::deploy::fsm::{DeploySession, SessionOptions, Stage, Timings};
use buildship::deploy::messages::{DeployMessage, Effect, Report};
use buildship::errors::CliError;
use buildship::logstream::{LogEntry, LogSource};
use buildship::upload::UploadProgress;
use chrono::{TimeZone, Utc};
use openapi_client::CreateAppResponse;

fn options() -> SessionOptions {
    SessionOptions::default()
}

fn app() -> CreateAppResponse {
    CreateAppResponse {
        build_id: "build-1".into(),
        status: "pending".into(),
        upload_url: "http://upload.test/app.zip".into(),
        dashboard_url: "https://dash.test/build-1".into(),
        internal_endpoint: "https://api.test/p-my-app".into(),
        ..Default::default()
    }
}

fn reports(effects: &[Effect]) -> Vec<&Report> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Report(r) => Some(r),
            _ => None,
        })
        .collect()
}

fn entry(id: &str, secs: i64) -> LogEntry {
    LogEntry {
        id: id.into(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        text: format!("line {id}"),
        source: LogSource::Build,
    }
}

/// Drive a session to the start of the upload, returning the shared counter
fn drive_to_upload(s: &mut DeploySession, size: u64) -> Arc<UploadProgress> {
    assert!(matches!(s.start().as_slice(), [Effect::LoadFiles]));
    s.update(DeployMessage::FilesLoaded(vec!["main.py".into()]));
    assert_eq!(s.stage(), Stage::ZippingFiles);
    s.update(DeployMessage::Archived {
        path: PathBuf::from("/tmp/staging/app.zip"),
        size,
    });
    assert_eq!(s.stage(), Stage::CreatingApp);
    let effects = s.update(DeployMessage::AppCreated(app()));
    assert_eq!(s.stage(), Stage::UploadingZip);
    assert_eq!(s.build_id(), Some("build-1"));
    effects
        .into_iter()
        .find_map(|e| match e {
            Effect::UploadArchive {
                progress,
                upload_url,
                ..
            } => {
                assert_eq!(upload_url, "http://upload.test/app.zip");
                Some(progress)
            }
            _ => None,
        })
        .expect("upload effect")
}

fn drive_to_building(s: &mut DeploySession) {
    let progress = drive_to_upload(s, 1000);
    progress.add(1000);
    s.update(DeployMessage::Uploaded);
    assert_eq!(s.stage(), Stage::BuildingApp);
}

#[test]
fn test_build_id_only_after_app_created() {
    let mut s = DeploySession::new(options());
    s.start();
    s.update(DeployMessage::FilesLoaded(vec!["main.py".into()]));
    s.update(DeployMessage::Archived {
        path: PathBuf::from("/tmp/staging/app.zip"),
        size: 10,
    });
    assert!(s.build_id().is_none());
    s.update(DeployMessage::AppCreated(app()));
    assert_eq!(s.build_id(), Some("build-1"));
}

#[test]
fn test_upload_progress_reported_per_decile_and_completes() {
    let mut s = DeploySession::new(options());
    let progress = drive_to_upload(&mut s, 1000);

    progress.add(150);
    let effects = s.update(DeployMessage::UploadTick);
    assert!(matches!(
        reports(&effects).as_slice(),
        [Report::UploadProgress(snap)] if snap.percent() == 15
    ));
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::ScheduleUploadTick(_))));

    // same decile again stays quiet
    progress.add(10);
    assert!(reports(&s.update(DeployMessage::UploadTick)).is_empty());
    let before = s.uploaded_bytes();

    // completion is authoritative even if the sampler lagged
    let effects = s.update(DeployMessage::Uploaded);
    assert!(s.uploaded_bytes() >= before);
    assert_eq!(s.uploaded_bytes(), 1000);
    assert!(matches!(
        reports(&effects).as_slice(),
        [Report::Uploaded(snap)] if snap.percent() == 100
    ));
    assert!(s.archive_path().is_none());
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::StartLogSupervision { build_id } if build_id == "build-1")));
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::PollBuildStatus { .. })));
}

#[test]
fn test_ticks_after_upload_are_ignored() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    assert!(s.update(DeployMessage::UploadTick).is_empty());
}

#[test]
fn test_status_poll_failure_is_retried_not_fatal() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);

    let effects = s.update(DeployMessage::BuildStatusPollFailed("connection reset".into()));
    assert_eq!(s.stage(), Stage::BuildingApp);
    assert!(matches!(
        effects.as_slice(),
        [Effect::PollBuildStatus { delay, .. }] if *delay == Duration::from_secs(1)
    ));

    for _ in 0..5 {
        let effects = s.update(DeployMessage::BuildStatus("building".into()));
        assert_eq!(s.stage(), Stage::BuildingApp);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::PollBuildStatus { .. })));
        s.update(DeployMessage::BuildStatusPollFailed("timeout".into()));
    }
    assert!(s.error().is_none());
    assert_eq!(s.build_status(), Some("building"));
}

#[test]
fn test_terminal_status_waits_for_drain() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);

    let effects = s.update(DeployMessage::BuildStatus("ready".into()));
    let complete = effects
        .into_iter()
        .find_map(|e| match e {
            Effect::Dispatch(msg) => Some(msg),
            _ => None,
        })
        .expect("build complete dispatch");
    assert_eq!(s.stage(), Stage::BuildingApp);

    let effects = s.update(complete);
    assert_eq!(s.stage(), Stage::DrainingLogs);
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::ScheduleDrain { status, delay } if status == "ready" && *delay == Duration::from_secs(2)
    )));
    assert!(!effects.iter().any(|e| matches!(e, Effect::Quit)));

    // logs keep arriving while draining, the newest line is held back
    let effects = s.update(DeployMessage::Logs(vec![entry("late", 10)]));
    assert!(reports(&effects).is_empty());

    let effects = s.update(DeployMessage::LogDrainComplete("ready".into()));
    assert_eq!(s.stage(), Stage::DeploySuccess);
    assert!(matches!(effects.last(), Some(Effect::Quit)));
    assert!(matches!(
        reports(&effects).first(),
        Some(Report::LogLines(lines)) if lines[0].id == "late"
    ));
    assert!(reports(&effects).iter().any(|r| matches!(
        r,
        Report::Success { dashboard_url, detached: false, .. } if dashboard_url == "https://dash.test/build-1"
    )));
}

#[test]
fn test_failed_build_status_ends_in_error() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    s.update(DeployMessage::BuildComplete("build_failure".into()));
    let effects = s.update(DeployMessage::LogDrainComplete("build_failure".into()));
    assert_eq!(s.stage(), Stage::DeployError);
    assert!(matches!(s.error(), Some(CliError::Api { .. })));
    assert_eq!(
        reports(&effects)
            .iter()
            .filter(|r| matches!(r, Report::Failed { .. }))
            .count(),
        1
    );
}

#[test]
fn test_error_is_reported_once() {
    let mut s = DeploySession::new(options());
    drive_to_upload(&mut s, 10);

    let effects = s.update(DeployMessage::Failed(CliError::api_status(403, "forbidden")));
    assert_eq!(s.stage(), Stage::DeployError);
    assert!(s.error_displayed());
    assert!(matches!(effects.first(), Some(Effect::CancelTasks)));
    assert!(matches!(
        reports(&effects).as_slice(),
        [Report::Failed { hint: Some(_), .. }]
    ));

    assert!(s.update(DeployMessage::Failed(CliError::api("again"))).is_empty());
    assert!(s.update(DeployMessage::Interrupted).is_empty());
}

#[test]
fn test_interrupt_during_build_cancels_remotely() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);

    let effects = s.update(DeployMessage::Interrupted);
    assert_eq!(s.stage(), Stage::Cancelling);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::CancelBuild { build_id } if build_id == "build-1")));
    assert!(!effects.iter().any(|e| matches!(e, Effect::Quit)));

    // stale poll results are dropped while cancelling
    assert!(s.update(DeployMessage::BuildStatus("ready".into())).is_empty());
    assert!(s
        .update(DeployMessage::Failed(CliError::api("request aborted")))
        .is_empty());
    assert_eq!(s.stage(), Stage::Cancelling);

    let effects = s.update(DeployMessage::BuildCancelled {
        cancel_error: Some("API error: timeout".into()),
    });
    assert_eq!(s.stage(), Stage::Cancelled);
    assert!(matches!(s.error(), Some(CliError::UserCancelled)));
    assert!(matches!(
        reports(&effects).as_slice(),
        [Report::Cancelled { warning: Some(w) }] if w.contains("build-1")
    ));
}

#[test]
fn test_interrupt_during_upload_cancels_remotely() {
    let mut s = DeploySession::new(options());
    drive_to_upload(&mut s, 10);
    let effects = s.update(DeployMessage::Interrupted);
    assert_eq!(s.stage(), Stage::Cancelling);
    assert!(effects
        .iter()
        .any(|e| matches!(e, Effect::CancelBuild { .. })));
}

#[test]
fn test_second_interrupt_exits_immediately() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    s.update(DeployMessage::Interrupted);
    let effects = s.update(DeployMessage::Interrupted);
    assert_eq!(s.stage(), Stage::Cancelled);
    assert!(matches!(effects.last(), Some(Effect::Quit)));
}

#[test]
fn test_logs_are_deduplicated() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);

    let effects = s.update(DeployMessage::Logs(vec![entry("a", 1), entry("b", 2)]));
    assert!(matches!(
        reports(&effects).as_slice(),
        [Report::LogLines(lines)] if lines.len() == 1
    ));
    let effects = s.update(DeployMessage::Logs(vec![entry("b", 2)]));
    assert!(effects.is_empty());
    assert_eq!(s.logs().len(), 2);
}

fn printed_ids(effects: &[Effect]) -> Vec<String> {
    reports(effects)
        .into_iter()
        .filter_map(|r| match r {
            Report::LogLines(lines) => Some(lines.iter().map(|l| l.id.clone())),
            _ => None,
        })
        .flatten()
        .collect()
}

#[test]
fn test_late_log_line_is_printed_in_timestamp_order() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);

    let mut printed = Vec::new();
    for msg in [
        DeployMessage::Logs(vec![entry("a", 1), entry("c", 3)]),
        DeployMessage::Logs(vec![entry("b", 2)]),
        DeployMessage::BuildComplete("ready".into()),
        DeployMessage::LogDrainComplete("ready".into()),
    ] {
        printed.extend(printed_ids(&s.update(msg)));
    }

    assert_eq!(printed, ["a", "b", "c"]);
    let buffered: Vec<_> = s.logs().entries().map(|e| e.id.clone()).collect();
    assert_eq!(buffered, printed);
}

#[test]
fn test_held_log_lines_are_printed_before_failure() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    s.update(DeployMessage::Logs(vec![entry("a", 1)]));

    let effects = s.update(DeployMessage::Failed(CliError::api("boom")));
    assert_eq!(printed_ids(&effects), ["a"]);
    assert!(matches!(reports(&effects).last(), Some(Report::Failed { .. })));
}

#[test]
fn test_finished_log_stream_prints_held_lines() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    s.update(DeployMessage::Logs(vec![entry("a", 1)]));

    let effects = s.update(DeployMessage::LogStreamEnded(None));
    assert_eq!(printed_ids(&effects), ["a"]);
    assert_eq!(s.stage(), Stage::BuildingApp);
}

#[test]
fn test_log_stream_failure_only_warns() {
    let mut s = DeploySession::new(options());
    drive_to_building(&mut s);
    let effects = s.update(DeployMessage::LogStreamEnded(Some("max reconnection attempts".into())));
    assert!(matches!(reports(&effects).as_slice(), [Report::Warning(_)]));
    assert_eq!(s.stage(), Stage::BuildingApp);
    assert!(s.update(DeployMessage::LogStreamEnded(None)).is_empty());
}

#[test]
fn test_detach_finishes_after_upload() {
    let mut s = DeploySession::new(SessionOptions {
        detach: true,
        ..options()
    });
    let progress = drive_to_upload(&mut s, 100);
    progress.add(100);
    let effects = s.update(DeployMessage::Uploaded);
    assert_eq!(s.stage(), Stage::DeploySuccess);
    assert!(s.detached());
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::StartLogSupervision { .. })));
    assert!(reports(&effects)
        .iter()
        .any(|r| matches!(r, Report::Success { detached: true, .. })));
}

#[test]
fn test_custom_timings_are_used() {
    let timings = Timings {
        status_poll_interval: Duration::from_millis(7),
        drain_delay: Duration::from_millis(3),
        ..Timings::default()
    };
    let mut s = DeploySession::new(SessionOptions {
        timings,
        ..options()
    });
    drive_to_building(&mut s);
    let effects = s.update(DeployMessage::BuildStatus("building".into()));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::PollBuildStatus { delay, .. } if *delay == Duration::from_millis(7)
    )));
    let effects = s.update(DeployMessage::BuildComplete("success".into()));
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::ScheduleDrain { delay, .. } if *delay == Duration::from_millis(3)
    )));
}
