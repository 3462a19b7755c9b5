//! REST client for the encoder backend.
//!
//! The backend defines no body contract beyond `GET /records`; every other
//! call is judged purely on its status code.

use dash_proto::record::{RecordId, StreamRecord};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {0}")]
    Status(StatusCode),
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_records(&self) -> Result<Vec<StreamRecord>, ApiError> {
        let url = format!("{}/records", self.base);
        debug!("api: GET {}", url);
        let response = self.http.get(&url).send().await?;
        Self::check(response.status())?;
        Ok(response.json().await?)
    }

    pub async fn start_stream(&self, id: RecordId) -> Result<(), ApiError> {
        self.post(&format!("start_stream/{}", id)).await
    }

    /// Stop takes the encoder's process id, not the record id.
    pub async fn stop_stream(&self, pid: u32) -> Result<(), ApiError> {
        self.post(&format!("stop_stream/{}", pid)).await
    }

    pub async fn restart(&self, id: RecordId) -> Result<(), ApiError> {
        self.post(&format!("restart/{}", id)).await
    }

    pub async fn delete_record(&self, id: RecordId) -> Result<(), ApiError> {
        let url = format!("{}/records/{}", self.base, id);
        debug!("api: DELETE {}", url);
        let response = self.http.delete(&url).send().await?;
        Self::check(response.status())
    }

    async fn post(&self, path: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base, path);
        debug!("api: POST {}", url);
        let response = self.http.post(&url).send().await?;
        Self::check(response.status())
    }

    fn check(status: StatusCode) -> Result<(), ApiError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status(status))
        }
    }
}
