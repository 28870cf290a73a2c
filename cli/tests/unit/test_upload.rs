use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::put;
use axum::Router;
use buildship::errors::CliError;
use buildship::http::upload::put_archive;
use buildship::upload::{ProgressSampler, UploadProgress};
use tokio::net::TcpListener;

type Received = Arc<Mutex<Option<(HeaderMap, Bytes)>>>;

async fn serve(status: StatusCode) -> (String, Received) {
    async fn handler(
        State((received, status)): State<(Received, StatusCode)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        *received.lock().unwrap() = Some((headers, body));
        status
    }

    let received: Received = Arc::default();
    let app = Router::new()
        .route("/bucket/app.zip", put(handler))
        .with_state((received.clone(), status));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/bucket/app.zip"), received)
}

fn write_archive(dir: &tempfile::TempDir, len: usize) -> (std::path::PathBuf, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let path = dir.path().join("app.zip");
    std::fs::write(&path, &data).unwrap();
    (path, data)
}

#[tokio::test]
async fn test_put_archive_streams_file_with_zip_headers() {
    let dir = tempfile::tempdir().unwrap();
    let (path, data) = write_archive(&dir, 200_000);
    let (url, received) = serve(StatusCode::OK).await;

    let progress = Arc::new(UploadProgress::new(data.len() as u64));
    let mut sampler = ProgressSampler::new(progress.clone());
    put_archive(&reqwest::Client::new(), &url, &path, progress.clone())
        .await
        .unwrap();

    let (headers, body) = received.lock().unwrap().clone().unwrap();
    assert_eq!(headers["content-type"], "application/zip");
    assert_eq!(headers["content-length"], data.len().to_string().as_str());
    assert_eq!(body.as_ref(), data.as_slice());

    assert_eq!(progress.bytes_sent(), data.len() as u64);
    assert_eq!(sampler.sample().percent(), 100);
}

#[tokio::test]
async fn test_put_archive_rejected_by_storage() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = write_archive(&dir, 1024);
    let (url, _) = serve(StatusCode::FORBIDDEN).await;

    let progress = Arc::new(UploadProgress::new(1024));
    let err = put_archive(&reqwest::Client::new(), &url, &path, progress)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Api { status: Some(403), .. }));
}

#[tokio::test]
async fn test_put_archive_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let progress = Arc::new(UploadProgress::new(0));
    let err = put_archive(
        &reqwest::Client::new(),
        "http://127.0.0.1:9/unused",
        &dir.path().join("gone.zip"),
        progress,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CliError::FileSystem(_)));
}
