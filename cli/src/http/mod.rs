//! Remote build API

pub mod builds;
pub mod client;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use openapi_client::{AppBuild, BuildLogsResponse, CreateAppResponse};
use serde_json::Value;

use crate::errors::CliError;
use crate::upload::UploadProgress;

/// App ids are the project id and app name joined by a dash
pub fn app_id(project_id: &str, app_name: &str) -> String {
    format!("{project_id}-{app_name}")
}

/// Every remote call a deployment makes.
///
/// Kept behind a trait so the orchestrator and log providers can run against
/// an in-memory double.
#[async_trait]
pub trait BuildApi: Send + Sync {
    async fn create_app(&self, project_id: &str, payload: &Value)
        -> Result<CreateAppResponse, CliError>;

    async fn create_partner_app(
        &self,
        project_id: &str,
        payload: &Value,
    ) -> Result<CreateAppResponse, CliError>;

    /// PUT the archive to a pre-signed URL, counting bytes into `progress`
    async fn upload_archive(
        &self,
        upload_url: &str,
        archive: &Path,
        progress: Arc<UploadProgress>,
    ) -> Result<(), CliError>;

    async fn get_build(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<AppBuild, CliError>;

    async fn fetch_build_logs(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<BuildLogsResponse, CliError>;

    async fn cancel_build(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<(), CliError>;
}
