//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use crate::errors::CliError;
use crate::utils::{calc_exp_backoff, user_agent, CooldownOptions};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const MAX_ATTEMPTS: u32 = 3;

/// HTTP client for the build API
pub struct HttpClient {
    client: Client,
    upload_client: Client,
    base_url: String,
    token: SecretString,
    cli_version: String,
    cooldown: CooldownOptions,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, token: SecretString) -> Result<Self, CliError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let upload_client = Client::builder()
            .user_agent(user_agent())
            .timeout(UPLOAD_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            upload_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            cli_version: crate::utils::version_info().version,
            cooldown: CooldownOptions::default(),
        })
    }

    /// Override the retry backoff
    pub fn with_cooldown(mut self, cooldown: CooldownOptions) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn upload_client(&self) -> &Client {
        &self.upload_client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token.expose_secret()))
            .header("X-Source", "cli")
            .header("X-CLI-Version", &self.cli_version)
    }

    /// Make a GET request, retrying transient failures
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CliError> {
        let url = self.url(path);
        let response = self
            .with_retry("GET", &url, || self.authorized(self.client.get(&url)))
            .await?;
        Ok(response.json().await?)
    }

    /// Make a POST request. Not retried, the server may have acted on it.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CliError> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| CliError::api(format!("POST {url} failed: {e}")))?;
        let response = check_status("POST", response).await?;
        Ok(response.json().await?)
    }

    /// Make a DELETE request, retrying transient failures
    pub async fn delete(&self, path: &str) -> Result<(), CliError> {
        let url = self.url(path);
        self.with_retry("DELETE", &url, || self.authorized(self.client.delete(&url)))
            .await?;
        Ok(())
    }

    async fn with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response, CliError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            debug!("{} {}", method, url);
            let result = match build().send().await {
                Ok(response) => check_status(method, response).await,
                Err(e) => Err(CliError::api(format!("{method} {url} failed: {e}"))),
            };
            match result {
                Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = calc_exp_backoff(&self.cooldown, attempt);
                    warn!("{} {} failed ({}), retrying in {:?}", method, url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Turn a non-success response into an API error carrying the server's message
pub(crate) async fn check_status(method: &str, response: Response) -> Result<Response, CliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} failed: {} - {}", method, status, body);
    let message = serde_json::from_str::<openapi_client::ErrorResponse>(&body)
        .ok()
        .map(|e| e.text().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or(body);
    Err(CliError::api_status(
        status.as_u16(),
        format!("{}: {}", status, message),
    ))
}
