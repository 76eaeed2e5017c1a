use std::time::Duration;

use poifier_common_types::Report;
use reqwest::StatusCode;
use tracing::*;
use url::Url;

use crate::auth::Credential;
use crate::metrics;

/// Name of the header that carries the [`Credential`].
pub const CREDENTIAL_HEADER: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to send PoI report: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("POIfier server rejected PoI report with status {0}")]
    Status(StatusCode),
}

/// Posts PoI reports to the POIfier server.
#[derive(Debug, Clone)]
pub struct Uploader {
    endpoint: Url,
    client: reqwest::Client,
}

impl Uploader {
    /// Reports are sent to `{server_url}/api/poi`.
    pub fn new(server_url: &Url, timeout: Duration) -> anyhow::Result<Self> {
        let mut endpoint = server_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("`{}` can't be used as a base URL", server_url))?
            .pop_if_empty()
            .extend(["api", "poi"]);

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint, records = report.len()))]
    pub async fn upload(&self, credential: &Credential, report: &Report) -> Result<(), UploadError> {
        let result = self.send(credential, report).await;

        let success = if result.is_ok() { "1" } else { "0" };
        metrics()
            .poi_report_uploads
            .with_label_values(&[success])
            .inc();

        match &result {
            Ok(()) => info!("Uploaded PoI report"),
            Err(e) => warn!(error = %e, "Failed to upload PoI report"),
        }
        result
    }

    async fn send(&self, credential: &Credential, report: &Report) -> Result<(), UploadError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CREDENTIAL_HEADER, credential.as_str())
            .json(report)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(UploadError::Status(status))
        }
    }
}
