mod chat;
mod health;
mod helper;
mod metrics;
mod translate;
mod tts;
mod upload;

pub use chat::{Chat, ChatRequest, ChatResponse, chat_handler, supports_thinking};
pub use health::{HealthResponse, SERVICE_NAME, health_handler};
pub use helper::{Helper, HelperRequest, HelperResponse, QueryKind, helper_handler};
pub use metrics::metrics_handler;
pub use translate::{Translate, TranslateRequest, TranslateResponse, translate_handler};
pub use tts::{Tts, TtsRequest, TtsResponse, tts_handler};
pub use upload::upload_handler;

use axum::{
    Json,
    body::Bytes,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{
        HeaderValue,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;

use crate::error::ApiError;
use crate::rate_limit::client_identity;

// Rate limiting identity of the caller.
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientId(client_identity(&parts.headers, peer)))
    }
}

// request body, buffered under the router's DefaultBodyLimit; rejections use the JSON error shape
pub struct RawBody(pub Bytes);

impl<S> FromRequest<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(request, state).await.inspect_err(|rejection| {
            tracing::warn!(status = rejection.status().as_u16(), "request body rejected");
        })?;
        Ok(RawBody(body))
    }
}

// cors headers on every response, any origin; OPTIONS itself is answered by preflight_handler
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

pub async fn preflight_handler() -> Json<Value> {
    Json(json!({ "success": true }))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
