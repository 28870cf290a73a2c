//! Build endpoints

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use openapi_client::{AppBuild, BuildLogsResponse, CreateAppResponse};
use serde_json::Value;

use crate::errors::CliError;
use crate::http::client::HttpClient;
use crate::http::BuildApi;
use crate::upload::UploadProgress;

#[async_trait]
impl BuildApi for HttpClient {
    async fn create_app(
        &self,
        project_id: &str,
        payload: &Value,
    ) -> Result<CreateAppResponse, CliError> {
        let path = format!("projects/{}/apps", project_id);
        self.post(&path, payload).await
    }

    async fn create_partner_app(
        &self,
        project_id: &str,
        payload: &Value,
    ) -> Result<CreateAppResponse, CliError> {
        let path = format!("projects/{}/partner-apps", project_id);
        self.post(&path, payload).await
    }

    async fn upload_archive(
        &self,
        upload_url: &str,
        archive: &Path,
        progress: Arc<UploadProgress>,
    ) -> Result<(), CliError> {
        crate::http::upload::put_archive(self.upload_client(), upload_url, archive, progress).await
    }

    async fn get_build(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<AppBuild, CliError> {
        let path = format!("projects/{}/apps/{}/builds/{}", project_id, app_id, build_id);
        self.get(&path).await
    }

    async fn fetch_build_logs(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<BuildLogsResponse, CliError> {
        let path = format!(
            "projects/{}/apps/{}/builds/{}/logs",
            project_id, app_id, build_id
        );
        self.get(&path).await
    }

    async fn cancel_build(
        &self,
        project_id: &str,
        app_id: &str,
        build_id: &str,
    ) -> Result<(), CliError> {
        let path = format!("projects/{}/apps/{}/builds/{}", project_id, app_id, build_id);
        self.delete(&path).await
    }
}
