//! Upload client for the remote storage endpoint.
//!
//! ## Wire format
//!
//! ```text
//! POST <endpoint>
//! { "file": "data:image/jpeg;base64,...",
//!   "options": { "folder": "pg/rooms", "fileName": "room-42-...-front.jpg", "isPublic": true } }
//!
//! 200 { "success": true,  "url": "https://cdn.example/pg/rooms/room-42-...-front.jpg" }
//! 200 { "success": false, "error": "quota exceeded" }
//! ```
//!
//! The response body is parsed into [`UploadResponse`] and immediately
//! narrowed to `Result<url, UploadError>` by [`UploadResponse::into_url`];
//! nothing past this module sees the loose `{success, url?, error?}` shape.

use crate::gallery::is_valid_reference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Reason reported when the endpoint gives none.
pub const GENERIC_FAILURE: &str = "Upload failed";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upload endpoint returned {0}")]
    Status(reqwest::StatusCode),
    /// The endpoint answered but refused the upload, or gave no URL.
    #[error("{0}")]
    Rejected(String),
}

/// Storage options sent alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOptions {
    pub folder: String,
    pub file_name: String,
    pub is_public: bool,
}

/// Request body: the compressed data URI plus where to store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub file: String,
    pub options: UploadOptions,
}

/// Raw response body as the endpoint sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UploadResponse {
    /// A response counts as success only if it says so *and* carries a usable
    /// URL (not blank, not a `"null"`/`"undefined"` placeholder).
    pub fn into_url(self) -> Result<String, UploadError> {
        match (self.success, self.url) {
            (true, Some(url)) if is_valid_reference(&url) => Ok(url),
            _ => Err(UploadError::Rejected(
                self.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            )),
        }
    }
}

/// Something that can store a payload and hand back its public URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<String, UploadError>;
}

/// JSON-over-HTTP uploader.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, request: UploadRequest) -> Result<String, UploadError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            file_name = %request.options.file_name,
            "uploading"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = match response.json::<UploadResponse>().await {
            Ok(body) => body,
            // An error page instead of a JSON body: report the status
            Err(_) if !status.is_success() => return Err(UploadError::Status(status)),
            Err(e) => return Err(e.into()),
        };
        body.into_url()
    }
}
