use dochub_core::{ResolvedPath, RunStatus};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Coarse failure classes the sync engine maps API errors onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveErrorClass {
    Auth,
    NotFound,
    RateLimit,
    Transient,
    Permanent,
}

impl DriveError {
    pub fn classification(&self) -> Option<DriveErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(DriveErrorClass::RateLimit | DriveErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> DriveErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        DriveErrorClass::Auth
    } else if status == StatusCode::NOT_FOUND {
        DriveErrorClass::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        DriveErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        DriveErrorClass::Transient
    } else {
        DriveErrorClass::Permanent
    }
}

/// Client for the drive structure API: the remote side resolves the
/// project root once, then materializes a whole run's folder list as a
/// server-side job that is polled for progress.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Resolves a raw root reference (share or folder URL) into the opaque
    /// id the job API works with.
    pub async fn resolve_root(
        &self,
        project_id: &str,
        root_url: &str,
    ) -> Result<ResolvedRoot, DriveError> {
        let url = self.endpoint("/v1/structure/resolve-root")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&ResolveRootRequest {
                project_id,
                url: root_url,
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Submits one run's resolved paths; folder decisions happen
    /// server-side after this returns.
    pub async fn start_job(
        &self,
        project_id: &str,
        run_id: &str,
        root_id: &str,
        paths: &[ResolvedPath],
    ) -> Result<StartedJob, DriveError> {
        let url = self.endpoint("/v1/structure/jobs")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&StartJobRequest {
                project_id,
                run_id,
                root_id,
                paths,
            })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Fetches the run-shaped snapshot of a submitted job.
    pub async fn poll_job(&self, job_id: &str) -> Result<JobSnapshot, DriveError> {
        let url = self.endpoint(&format!("/v1/structure/jobs/{job_id}"))?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRootRequest<'a> {
    project_id: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartJobRequest<'a> {
    project_id: &'a str,
    run_id: &'a str,
    root_id: &'a str,
    paths: &'a [ResolvedPath],
}

/// Resolved drive root; persisted per project so later runs skip the
/// lookup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRoot {
    pub root_id: String,
    pub root_name: String,
    #[serde(default)]
    pub root_web_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedJob {
    pub job_id: String,
}

/// Row-shaped job state the poll endpoint returns; field names match the
/// server's run table columns.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobSnapshot {
    pub status: RunStatus,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default)]
    pub total_actions: Option<u32>,
    #[serde(default)]
    pub completed_actions: u32,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

impl JobSnapshot {
    /// Terminal when the server reached an end state or stamped a finish
    /// time.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal() || self.finished_at.is_some()
    }
}
