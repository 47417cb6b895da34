//! Fetch transport for the URL cache: one presigned URL per file id from
//! the gallery backend's URL-retrieval endpoint.

use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error("response carried no URL")]
    MissingUrl,
}

/// Port for fetching one file's presigned URL.
pub trait FileUrlFetcher: Send + Sync {
    fn fetch_url(&self, file_id: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Production fetcher against `GET {base}/image-gallery/files/{id}/url`.
pub struct HttpUrlFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUrlFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl FileUrlFetcher for HttpUrlFetcher {
    async fn fetch_url(&self, file_id: &str) -> Result<String, FetchError> {
        let body: Value = self
            .http
            .get(format!(
                "{}/image-gallery/files/{}/url",
                self.base_url, file_id
            ))
            .send()
            .await?
            .json()
            .await?;

        if body["success"].as_bool() != Some(true) {
            let message = body["message"].as_str().unwrap_or("unknown error");
            return Err(FetchError::Rejected(message.to_string()));
        }
        body["data"]["url"]
            .as_str()
            .map(str::to_string)
            .ok_or(FetchError::MissingUrl)
    }
}
