//! HTTP client for configured targets.
//!
//! # Responsibilities
//! - Resolve request paths against the target's base URL
//! - Attach the target's bearer token
//! - Run every request through the target's resilience pipeline
//! - Classify transport and status failures for the retry layer
//!
//! # Design Decisions
//! - No reqwest-level timeout; the pipeline owns per-attempt deadlines
//! - Body decoding happens inside the attempt, so a malformed payload is a
//!   (non-transient) failure the breaker sees

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::TargetConfig;
use crate::resilience::{Classify, FailureKind, ResilienceError, ResiliencePipeline};

/// Failure of a single HTTP attempt.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            CallError::Connect(err)
        } else if err.is_timeout() {
            CallError::Timeout(err)
        } else {
            CallError::Transport(err)
        }
    }
}

impl Classify for CallError {
    fn kind(&self) -> FailureKind {
        match self {
            CallError::Connect(_) | CallError::Timeout(_) | CallError::Transport(_) => {
                FailureKind::Transient
            }
            CallError::Status { status, .. } if is_transient_status(*status) => FailureKind::Transient,
            CallError::Status { .. } | CallError::Decode(_) | CallError::InvalidUrl(_) => {
                FailureKind::NonTransient
            }
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Result of a protected call.
pub type CallResult<T> = Result<T, ResilienceError<CallError>>;

/// Client for one target, bound to that target's pipeline.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    pipeline: Arc<ResiliencePipeline>,
}

impl ServiceClient {
    pub fn new(target: &TargetConfig, pipeline: Arc<ResiliencePipeline>) -> Result<Self, CallError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("resilience-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(http, target, pipeline)
    }

    /// Use a preconfigured `reqwest::Client` (proxies, TLS roots, pooling).
    pub fn with_http_client(
        http: reqwest::Client,
        target: &TargetConfig,
        pipeline: Arc<ResiliencePipeline>,
    ) -> Result<Self, CallError> {
        let mut base_url = Url::parse(&target.url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            token: target.token.clone(),
            pipeline,
        })
    }

    pub fn pipeline(&self) -> &Arc<ResiliencePipeline> {
        &self.pipeline
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` relative to the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, CallError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    pub async fn get_text(&self, path: &str) -> CallResult<String> {
        self.get_text_with_cancellation(path, &CancellationToken::new())
            .await
    }

    pub async fn get_text_with_cancellation(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> CallResult<String> {
        let url = self.resolve(path)?;
        let url = &url;
        let client = self;

        self.pipeline
            .execute_with_cancellation(cancel, move || client.fetch(url))
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> CallResult<T> {
        self.get_json_with_cancellation(path, &CancellationToken::new())
            .await
    }

    pub async fn get_json_with_cancellation<T: DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> CallResult<T> {
        let url = self.resolve(path)?;
        let url = &url;
        let client = self;

        self.pipeline
            .execute_with_cancellation(cancel, move || async move {
                let body = client.fetch(url).await?;
                serde_json::from_str::<T>(&body).map_err(CallError::Decode)
            })
            .await
    }

    fn resolve(&self, path: &str) -> CallResult<Url> {
        self.endpoint(path)
            .map_err(|error| ResilienceError::NonTransient {
                target: self.pipeline.target().to_string(),
                attempts: 0,
                error,
            })
    }

    async fn fetch(&self, url: &Url) -> Result<String, CallError> {
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Target returned error status");
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}
