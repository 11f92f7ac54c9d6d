//! HTTP client for the git sensor service.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use services::services::clients::{
    ClientError, GitSensorClient, SensorMaterial, SensorPipelineMaterial,
};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: usize = 3;

const REPO_PATH: &str = "admin/repo";
const PIPELINE_MATERIAL_PATH: &str = "admin/ci-pipeline-material";

fn classify(status: StatusCode, body: &str) -> ClientError {
    let message = format!("git sensor returned {status}: {body}");
    match status {
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::CONFLICT => ClientError::AlreadyExists(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            ClientError::Unavailable(message)
        }
        _ => ClientError::Rejected(message),
    }
}

#[derive(Debug, Clone)]
pub struct HttpGitSensorClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGitSensorClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ClientError::Rejected(format!("invalid git sensor url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Unavailable(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Rejected(format!("invalid git sensor path {path}: {e}")))
    }

    async fn send_once<T: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        url: &Url,
        body: &T,
    ) -> Result<(), ClientError> {
        let resp = self
            .client
            .request(method, url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Unavailable(format!("git sensor unreachable: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }

    /// Retries only while the sensor is unavailable.
    async fn send<T: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(path)?;
        (|| self.send_once(method.clone(), &url, body))
            .retry(ExponentialBuilder::default().with_max_times(MAX_ATTEMPTS))
            .when(|err| matches!(err, ClientError::Unavailable(_)))
            .notify(|err, after| {
                tracing::warn!(%url, error = %err, retry_in = ?after, "git sensor call failed");
            })
            .await
    }
}

#[async_trait]
impl GitSensorClient for HttpGitSensorClient {
    async fn add_repo(&self, materials: &[SensorMaterial]) -> Result<(), ClientError> {
        self.send(Method::POST, REPO_PATH, materials).await
    }

    async fn update_repo(&self, material: &SensorMaterial) -> Result<(), ClientError> {
        self.send(Method::PUT, REPO_PATH, material).await
    }

    async fn save_pipeline_material(
        &self,
        materials: &[SensorPipelineMaterial],
    ) -> Result<(), ClientError> {
        self.send(Method::POST, PIPELINE_MATERIAL_PATH, materials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path() {
        let client = HttpGitSensorClient::new("http://sensor.devtroncd:80/git-sensor").unwrap();
        assert_eq!(
            client.endpoint(REPO_PATH).unwrap().as_str(),
            "http://sensor.devtroncd/git-sensor/admin/repo"
        );
        let client = HttpGitSensorClient::new("http://localhost:7070/").unwrap();
        assert_eq!(
            client.endpoint(PIPELINE_MATERIAL_PATH).unwrap().as_str(),
            "http://localhost:7070/admin/ci-pipeline-material"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            HttpGitSensorClient::new("not a url"),
            Err(ClientError::Rejected(_))
        ));
    }

    #[test]
    fn status_codes_classify_into_client_errors() {
        assert!(classify(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(classify(StatusCode::CONFLICT, "").is_already_exists());
        assert!(matches!(
            classify(StatusCode::BAD_GATEWAY, "upstream"),
            ClientError::Unavailable(_)
        ));
        assert!(matches!(
            classify(StatusCode::BAD_REQUEST, "bad material"),
            ClientError::Rejected(m) if m.contains("bad material")
        ));
    }
}
