use std::time::Duration;

use dochub_core::{Category, ResolvedPath, SuppliersByCategory};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default address the bridge helper listens on.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3847";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge unreachable: {0}")]
    Unreachable(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("bridge returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl BridgeError {
    fn transport(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            BridgeError::Unreachable(error)
        } else {
            BridgeError::Request(error)
        }
    }

    /// True when the helper process itself could not be reached, as
    /// opposed to a request it answered with an error.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::Unreachable(_))
    }
}

/// Client for the local bridge helper that performs filesystem operations
/// on the engine's behalf. All calls are synchronous per-folder
/// round-trips on localhost.
#[derive(Clone)]
pub struct BridgeClient {
    http: Client,
    base_url: Url,
}

impl BridgeClient {
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, BridgeError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Liveness probe with its own short timeout so callers can fail fast
    /// before touching any folder.
    pub async fn health(&self, timeout: Duration) -> Result<BridgeHealth, BridgeError> {
        let url = self.endpoint("/health")?;
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        Self::handle_response(response).await
    }

    pub async fn is_running(&self, timeout: Duration) -> bool {
        self.health(timeout).await.is_ok()
    }

    pub async fn folder_exists(&self, folder_path: &str) -> Result<FolderCheck, BridgeError> {
        let url = self.endpoint("/folder-exists")?;
        let response = self
            .http
            .post(url)
            .json(&FolderPathRequest { folder_path })
            .send()
            .await
            .map_err(BridgeError::transport)?;
        Self::handle_response(response).await
    }

    pub async fn create_folder(&self, folder_path: &str) -> Result<CreatedFolder, BridgeError> {
        let url = self.endpoint("/create-folder")?;
        let response = self
            .http
            .post(url)
            .json(&FolderPathRequest { folder_path })
            .send()
            .await
            .map_err(BridgeError::transport)?;
        Self::handle_response(response).await
    }

    /// One-shot batch walk performed bridge-side. The bootstrap command
    /// uses this; the engine drives folders one by one instead.
    pub async fn ensure_structure(
        &self,
        request: &EnsureStructureRequest<'_>,
    ) -> Result<EnsureStructureSummary, BridgeError> {
        let url = self.endpoint("/ensure-structure")?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(BridgeError::transport)?;
        Self::handle_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, BridgeError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BridgeError> {
        if response.status().is_success() {
            response.json::<T>().await.map_err(BridgeError::Request)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(BridgeError::Api { status, body })
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderPathRequest<'a> {
    folder_path: &'a str,
}

/// Batch request mirroring one resolved run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureStructureRequest<'a> {
    pub root_path: &'a str,
    pub paths: &'a [ResolvedPath],
    pub categories: &'a [Category],
    pub suppliers: &'a SuppliersByCategory,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHealth {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCheck {
    pub exists: bool,
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFolder {
    pub success: bool,
    pub path: String,
    #[serde(default)]
    pub created: bool,
}

/// Counts and log lines of a bridge-side batch walk.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureStructureSummary {
    pub success: bool,
    pub root_path: String,
    pub created_count: u32,
    pub reused_count: u32,
    #[serde(default)]
    pub logs: Vec<String>,
}
