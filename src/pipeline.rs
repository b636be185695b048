use axum::http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, Result};
use crate::metrics::{ERROR_TOTAL, RATE_LIMITED_TOTAL, REQUEST_TOTAL};
use crate::models::{GenerateContentRequest, GenerateContentResponse, Part};
use crate::rate_limit::{Admission, RouteLimit};
use crate::state::AppState;
use crate::upstream::UpstreamError;

// How upstream statuses other than 400/429 reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorPolicy {
    // Everything else becomes a 500.
    Normalize,
    // Upstream 4xx/5xx statuses are forwarded as-is (message stays generic).
    PassthroughStatus,
}

impl UpstreamErrorPolicy {
    pub fn map(self, err: UpstreamError) -> ApiError {
        match err {
            UpstreamError::RateLimited => ApiError::UpstreamRateLimited,
            UpstreamError::BadRequest(message) => ApiError::UpstreamBadRequest(
                message.unwrap_or_else(|| "Invalid request".to_string()),
            ),
            UpstreamError::Timeout => ApiError::UpstreamTimeout,
            UpstreamError::Decode(_) => ApiError::MalformedUpstreamResponse,
            UpstreamError::Status(status)
                if self == UpstreamErrorPolicy::PassthroughStatus
                    && (status.is_client_error() || status.is_server_error()) =>
            {
                ApiError::UpstreamUnavailable { status }
            }
            UpstreamError::Status(_) | UpstreamError::Network(_) => ApiError::UpstreamUnavailable {
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

// Static per-route configuration.
#[derive(Debug, Clone, Copy)]
pub struct RouteConfig {
    pub name: &'static str,
    pub limit: RouteLimit,
    // Maximum length of the primary text field, in characters.
    pub max_text_len: usize,
    pub upstream_errors: UpstreamErrorPolicy,
}

// A validated request ready to send upstream.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub model: String,
    pub request: GenerateContentRequest,
}

pub trait ProxyRoute: Sync {
    type Input: DeserializeOwned + Send;
    type Output: Serialize;

    const CONFIG: RouteConfig;

    // Validate the body and build the upstream request.
    fn shape(&self, state: &AppState, input: &Self::Input) -> Result<Outbound>;

    fn extract(
        &self,
        input: Self::Input,
        outbound: Outbound,
        response: GenerateContentResponse,
    ) -> Result<Self::Output>;
}

pub async fn run<R: ProxyRoute>(
    state: &AppState,
    route: &R,
    client_id: &str,
    body: &[u8],
) -> Result<R::Output> {
    let config = R::CONFIG;
    REQUEST_TOTAL.with_label_values(&[config.name]).inc();

    let result = proxy(state, route, client_id, body).await;
    if let Err(err) = &result {
        ERROR_TOTAL
            .with_label_values(&[config.name, err.code()])
            .inc();
    }
    result
}

async fn proxy<R: ProxyRoute>(
    state: &AppState,
    route: &R,
    client_id: &str,
    body: &[u8],
) -> Result<R::Output> {
    let config = R::CONFIG;

    admit(state, config.name, config.limit, client_id)?;

    let input: R::Input = parse_body(body)?;
    let outbound = route.shape(state, &input)?;
    let api_key = state.api_key().inspect_err(|_| {
        tracing::error!(route = config.name, "upstream API key is not configured");
    })?;

    let response = state
        .upstream
        .generate_content(&outbound.model, api_key, &outbound.request)
        .await
        .map_err(|err| {
            tracing::warn!(route = config.name, model = %outbound.model, error = %err, "upstream call failed");
            config.upstream_errors.map(err)
        })?;

    route.extract(input, outbound, response)
}

// Rate limiter admission for `client_id` on the given route.
pub fn admit(state: &AppState, route: &str, limit: RouteLimit, client_id: &str) -> Result<()> {
    match state.rate_limiter.check(route, client_id, limit) {
        Admission::Allowed => Ok(()),
        Admission::Denied { retry_after_secs } => {
            RATE_LIMITED_TOTAL.with_label_values(&[route]).inc();
            tracing::warn!(
                route,
                client = client_id,
                retry_after_secs,
                "rate limit exceeded"
            );
            Err(ApiError::RateLimitExceeded { retry_after_secs })
        }
    }
}

pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::InvalidInput("Request body is required".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidInput(format!("Invalid request body: {e}")))
}

// non-blank, at most max_len chars; returns the trimmed text
pub fn validate_text<'a>(field: &str, value: Option<&'a str>, max_len: usize) -> Result<&'a str> {
    let text = value.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::InvalidInput(format!(
            "{field} is required and must be a non-empty string"
        )));
    }

    let len = value.map_or(0, |v| v.chars().count());
    if len > max_len {
        return Err(ApiError::InvalidInput(format!(
            "{field} is too long ({len} characters, maximum is {max_len})"
        )));
    }
    Ok(text)
}

// Model ids are spliced into the upstream URL path.
pub fn validate_model(model: &str) -> Result<&str> {
    let ok = !model.is_empty()
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if ok {
        Ok(model)
    } else {
        Err(ApiError::InvalidInput(format!("Unsupported model identifier: {model}")))
    }
}

// Non-thought text parts of the first candidate, concatenated.
pub fn answer_text(response: &GenerateContentResponse) -> Result<String> {
    let parts = response
        .first_parts()
        .ok_or(ApiError::MalformedUpstreamResponse)?;
    let text = join_text(parts.iter().filter(|p| !p.is_thought()));
    if text.trim().is_empty() {
        return Err(ApiError::EmptyResult);
    }
    Ok(text)
}

pub fn join_text<'a>(parts: impl Iterator<Item = &'a Part>) -> String {
    parts.filter_map(|p| p.text.as_deref()).collect()
}
