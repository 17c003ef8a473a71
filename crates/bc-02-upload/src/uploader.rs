//! # Data Uploader
//!
//! One batch, one POST. The uploader never retries by itself; the worker
//! decides from the returned [`UploadStatus`].

use crate::config::{HttpUploaderConfig, PayloadFormat, UploadError};
use crate::status::UploadStatus;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use shared_types::Event;
use std::time::Duration;
use uuid::Uuid;

/// Outbound port: transfer one batch.
#[async_trait]
pub trait DataUploader: Send + Sync {
    async fn upload(&self, events: &[Event]) -> UploadStatus;
}

/// [`DataUploader`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpDataUploader {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    headers: HeaderMap,
    request_id_header: Option<HeaderName>,
    format: PayloadFormat,
}

impl HttpDataUploader {
    pub fn new(config: HttpUploaderConfig, timeout: Duration) -> Result<Self, UploadError> {
        let endpoint =
            reqwest::Url::parse(&config.endpoint).map_err(|e| UploadError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: e.to_string(),
            })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(UploadError::InvalidEndpoint {
                endpoint: config.endpoint,
                reason: "scheme must be http or https".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| UploadError::InvalidHeader { name: name.clone() })?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| UploadError::InvalidHeader { name: name.clone() })?;
            headers.append(header, value);
        }

        let request_id_header = config
            .request_id_header
            .as_deref()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes()).map_err(|_| UploadError::InvalidHeader {
                    name: name.to_string(),
                })
            })
            .transpose()?;

        // A followed 301/302/303 is replayed as a bodyless GET.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            headers,
            request_id_header,
            format: config.format,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl DataUploader for HttpDataUploader {
    async fn upload(&self, events: &[Event]) -> UploadStatus {
        let body = self.format.join(events.iter().map(|e| e.data.as_slice()));
        let request_id = Uuid::new_v4().to_string();

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .body(body);
        if let Some(header) = &self.request_id_header {
            request = request.header(header.clone(), request_id.as_str());
        }

        let status = match request.send().await {
            Ok(response) => UploadStatus::from_response_code(response.status().as_u16()),
            Err(e) => UploadStatus::NetworkError {
                message: e.to_string(),
            },
        };

        match &status {
            UploadStatus::ClientError { code: code @ (401 | 403) } => {
                tracing::error!(
                    request_id = %request_id,
                    code,
                    "Collector rejected the credentials; check the configured API key headers"
                );
            }
            UploadStatus::ClientError { code } => {
                tracing::warn!(request_id = %request_id, code, events = events.len(), "Batch rejected, dropping it");
            }
            _ => {
                tracing::debug!(request_id = %request_id, status = %status, events = events.len(), "Upload finished");
            }
        }
        status
    }
}
