use axum::{
    extract::State,
    http::{HeaderMap, header::CONTENT_TYPE},
};
use std::sync::Arc;

use super::ClientId;
use crate::error::{ApiError, Result};
use crate::metrics::{ERROR_TOTAL, REQUEST_TOTAL};
use crate::pipeline;
use crate::rate_limit::RouteLimit;
use crate::state::AppState;

const ROUTE: &str = "upload";
const LIMIT: RouteLimit = RouteLimit::per_window(10);

// Placeholder: the content type is checked, nothing is ever stored.
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    headers: HeaderMap,
) -> Result<()> {
    REQUEST_TOTAL.with_label_values(&[ROUTE]).inc();
    let result = check_upload(&state, &client, &headers);
    if let Err(err) = &result {
        ERROR_TOTAL.with_label_values(&[ROUTE, err.code()]).inc();
    }
    result
}

fn check_upload(state: &AppState, client: &str, headers: &HeaderMap) -> Result<()> {
    pipeline::admit(state, ROUTE, LIMIT, client)?;

    let is_multipart = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            v.trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        });
    if !is_multipart {
        return Err(ApiError::InvalidInput(
            "Content-Type must be multipart/form-data".to_string(),
        ));
    }

    tracing::info!(client = %client, "upload attempted on stub endpoint");
    Err(ApiError::NotImplemented(
        "File upload is not implemented yet".to_string(),
    ))
}
