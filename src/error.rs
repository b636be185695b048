use axum::{
    Json,
    extract::rejection::BytesRejection,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// Seconds a client is told to wait after the upstream API rate limits us.
pub const UPSTREAM_RETRY_AFTER_SECS: u64 = 60;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Too many requests. Please try again in {retry_after_secs} seconds.")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Request body is too large.")]
    PayloadTooLarge,

    // Upstream credential is missing from the process configuration
    #[error("Service configuration error. Please try again later.")]
    ServiceConfiguration,

    #[error("The AI service is busy. Please try again in a minute.")]
    UpstreamRateLimited,

    #[error("{0}")]
    UpstreamBadRequest(String),

    #[error("The AI service is temporarily unavailable. Please try again later.")]
    UpstreamUnavailable { status: StatusCode },

    #[error("The AI service took too long to respond.")]
    UpstreamTimeout,

    #[error("Received an unexpected response from the AI service.")]
    MalformedUpstreamResponse,

    #[error("The AI service returned an empty response.")]
    EmptyResult,

    #[error("No audio was generated for this text.")]
    NoAudioGenerated,

    #[error("{0}")]
    NotImplemented(String),

    #[error("Not found")]
    NotFound,

    // Detail is logged, never returned
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::RateLimitExceeded { .. } | ApiError::UpstreamRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::InvalidInput(_) | ApiError::UpstreamBadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UpstreamUnavailable { status } => *status,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ServiceConfiguration
            | ApiError::MalformedUpstreamResponse
            | ApiError::EmptyResult
            | ApiError::NoAudioGenerated
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Short machine-readable code for the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ApiError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::ServiceConfiguration => "SERVICE_CONFIGURATION_ERROR",
            ApiError::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            ApiError::UpstreamBadRequest(_) => "UPSTREAM_BAD_REQUEST",
            ApiError::UpstreamUnavailable { .. } => "SERVICE_UNAVAILABLE",
            ApiError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            ApiError::MalformedUpstreamResponse => "UNEXPECTED_RESPONSE",
            ApiError::EmptyResult => "EMPTY_RESPONSE",
            ApiError::NoAudioGenerated => "NO_AUDIO_GENERATED",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ApiError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            ApiError::UpstreamRateLimited => Some(UPSTREAM_RETRY_AFTER_SECS),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "An internal error occurred.".to_string(),
            other => other.to_string(),
        }
    }
}

// body over the configured limit, or a body that could not be read at all
impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::Internal(format!("failed to read request body: {}", rejection.body_text()))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    // Only set for our own limiter: seconds until the client's window resets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_in: Option<u64>,
}

impl From<&ApiError> for ErrorBody {
    fn from(err: &ApiError) -> Self {
        let reset_in = match err {
            ApiError::RateLimitExceeded { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self {
            success: false,
            error: err.code(),
            message: err.public_message(),
            retry_after: err.retry_after_secs(),
            reset_in,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "internal error");
        }

        let body = ErrorBody::from(&self);
        let mut response = (self.status(), Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
