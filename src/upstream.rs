use axum::http::StatusCode;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::metrics::UPSTREAM_LATENCY;
use crate::models::{GenerateContentRequest, GenerateContentResponse, UpstreamErrorBody};

// Transport-level outcome of an upstream call, before route policy maps it.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rate limited")]
    RateLimited,

    #[error("upstream rejected request: {}", .0.as_deref().unwrap_or("no message"))]
    BadRequest(Option<String>),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("upstream call timed out")]
    Timeout,

    #[error("upstream unreachable: {0}")]
    Network(#[source] reqwest::Error),

    #[error("could not decode upstream response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, UpstreamError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let start_time = Instant::now();

        let result = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await;

        UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

        let res = result.map_err(classify)?;
        let status = res.status();

        if status.is_success() {
            return res.json::<GenerateContentResponse>().await.map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Decode(e)
                }
            });
        }

        tracing::warn!(model, status = status.as_u16(), "upstream returned an error");

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(UpstreamError::RateLimited),
            StatusCode::BAD_REQUEST => {
                // best effort: only the message field is ever surfaced
                let message = res
                    .json::<UpstreamErrorBody>()
                    .await
                    .ok()
                    .and_then(|body| body.error)
                    .and_then(|detail| detail.message)
                    .filter(|m| !m.trim().is_empty());
                Err(UpstreamError::BadRequest(message))
            }
            other => Err(UpstreamError::Status(other)),
        }
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Network(err)
    }
}
