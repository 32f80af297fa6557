//! Delivery of single records to the Cloudlog QSO API.

use std::future::Future;

use serde::Serialize;
use tracing::debug;

use crate::{
    config::{CloudlogConfig, UploadConfig},
    qso::QsoRecord,
};

/// Path of the QSO endpoint relative to the configured base URL.
pub const API_PATH: &str = "/index.php/api/qso";

const BODY_EXCERPT_CHARS: usize = 100;

/// Why a record was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// The line is not a valid record.
    #[error("Invalid ADIF format")]
    InvalidFormat,
    /// The server answered with something other than 200/201.
    #[error("{code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Start of the response body.
        body: String,
    },
    /// The request never completed.
    #[error("{0}")]
    Transport(String),
}

/// Result alias for uploads.
pub type UploadResult<T> = Result<T, UploadError>;

/// One-shot delivery of a raw record line. No retry is attempted.
pub trait QsoUploader: Send + Sync {
    /// Sends `line` and reports whether the server accepted it.
    fn push(&self, line: &str) -> impl Future<Output = UploadResult<()>> + Send;
}

#[derive(Debug, Serialize)]
struct QsoEnvelope<'a> {
    key: &'a str,
    station_profile_id: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    string: &'a str,
}

/// HTTP client for a Cloudlog server.
#[derive(Debug, Clone)]
pub struct CloudlogClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    station_id: String,
}

impl CloudlogClient {
    /// Builds a client with the configured request timeout.
    pub fn new(cloudlog: &CloudlogConfig, upload: &UploadConfig) -> UploadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(upload.timeout)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}{API_PATH}", cloudlog.url.trim_end_matches('/')),
            api_key: cloudlog.api_key.clone(),
            station_id: cloudlog.station_id.clone(),
        })
    }

    /// Full URL records are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl QsoUploader for CloudlogClient {
    async fn push(&self, line: &str) -> UploadResult<()> {
        let mut rec = QsoRecord::parse(line).ok_or(UploadError::InvalidFormat)?;
        rec.normalize_tx_pwr();

        // The server parses the record itself, so the line goes out verbatim.
        let body = QsoEnvelope {
            key: &self.api_key,
            station_profile_id: &self.station_id,
            kind: "adif",
            string: line,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let code = resp.status().as_u16();
        debug!(call = rec.call(), code, "upload response");
        if matches!(code, 200 | 201) {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        Err(UploadError::Status {
            code,
            body: text.chars().take(BODY_EXCERPT_CHARS).collect(),
        })
    }
}
