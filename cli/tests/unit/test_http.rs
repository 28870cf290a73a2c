//! Build API client against a local axum server

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use buildship::errors::CliError;
use buildship::http::client::HttpClient;
use buildship::http::BuildApi;
use buildship::utils::CooldownOptions;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Recorded {
    hits: Arc<AtomicUsize>,
    headers: Arc<Mutex<Option<HeaderMap>>>,
    body: Arc<Mutex<Option<Value>>>,
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> HttpClient {
    HttpClient::new(base_url, SecretString::from("secret-token"))
        .unwrap()
        .with_cooldown(CooldownOptions {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        })
}

#[tokio::test]
async fn test_create_app_sends_auth_headers_and_payload() {
    async fn handler(
        State(rec): State<Recorded>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        *rec.headers.lock().unwrap() = Some(headers);
        *rec.body.lock().unwrap() = Some(body);
        Json(json!({
            "buildId": "b-1",
            "status": "pending",
            "uploadUrl": "https://storage.test/put",
            "dashboardUrl": "https://dash.test/b-1"
        }))
    }

    let rec = Recorded::default();
    let app = Router::new()
        .route("/v1/projects/p-1/apps", post(handler))
        .with_state(rec.clone());
    let base = serve(app).await;

    let api = client(&format!("{base}/v1/"));
    let app = api
        .create_app("p-1", &json!({"name": "my-app"}))
        .await
        .unwrap();

    assert_eq!(app.build_id, "b-1");
    assert_eq!(app.upload_url, "https://storage.test/put");
    assert!(app.internal_endpoint.is_empty());

    let headers = rec.headers.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer secret-token");
    assert_eq!(headers["x-source"], "cli");
    assert!(headers.contains_key("x-cli-version"));
    assert_eq!(
        rec.body.lock().unwrap().clone().unwrap(),
        json!({"name": "my-app"})
    );
}

#[tokio::test]
async fn test_error_body_message_is_surfaced_with_status() {
    async fn handler() -> (StatusCode, Json<Value>) {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized", "message": "token expired"})),
        )
    }

    let base = serve(Router::new().route("/projects/p-1/partner-apps", post(handler))).await;
    let err = client(&base)
        .create_partner_app("p-1", &json!({}))
        .await
        .unwrap_err();

    match &err {
        CliError::Api { status, message } => {
            assert_eq!(*status, Some(401));
            assert!(message.contains("token expired"), "{message}");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.hint().is_some());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_get_retries_server_errors() {
    async fn handler(State(rec): State<Recorded>) -> Result<Json<Value>, StatusCode> {
        if rec.hits.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
        Ok(Json(json!({"id": "b-1", "status": "building"})))
    }

    let rec = Recorded::default();
    let app = Router::new()
        .route("/projects/p-1/apps/p-1-app/builds/b-1", get(handler))
        .with_state(rec.clone());
    let base = serve(app).await;

    let build = client(&base).get_build("p-1", "p-1-app", "b-1").await.unwrap();
    assert_eq!(build.status, "building");
    assert_eq!(rec.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_get_gives_up_after_three_attempts() {
    async fn handler(State(rec): State<Recorded>) -> StatusCode {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::BAD_GATEWAY
    }

    let rec = Recorded::default();
    let app = Router::new()
        .route("/projects/p-1/apps/p-1-app/builds/b-1/logs", get(handler))
        .with_state(rec.clone());
    let base = serve(app).await;

    let err = client(&base)
        .fetch_build_logs("p-1", "p-1-app", "b-1")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(rec.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_post_is_not_retried() {
    async fn handler(State(rec): State<Recorded>) -> StatusCode {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::INTERNAL_SERVER_ERROR
    }

    let rec = Recorded::default();
    let app = Router::new()
        .route("/projects/p-1/apps", post(handler))
        .with_state(rec.clone());
    let base = serve(app).await;

    assert!(client(&base).create_app("p-1", &json!({})).await.is_err());
    assert_eq!(rec.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancel_build_deletes_the_build() {
    async fn handler(State(rec): State<Recorded>) -> StatusCode {
        rec.hits.fetch_add(1, Ordering::SeqCst);
        StatusCode::NO_CONTENT
    }

    let rec = Recorded::default();
    let app = Router::new()
        .route("/projects/p-1/apps/p-1-app/builds/b-1", delete(handler))
        .with_state(rec.clone());
    let base = serve(app).await;

    client(&base)
        .cancel_build("p-1", "p-1-app", "b-1")
        .await
        .unwrap();
    assert_eq!(rec.hits.load(Ordering::SeqCst), 1);
}
