use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ClientId, RawBody};
use crate::error::{ApiError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::pipeline::{
    self, Outbound, ProxyRoute, RouteConfig, UpstreamErrorPolicy, answer_text, validate_text,
};
use crate::rate_limit::RouteLimit;
use crate::state::AppState;

pub const AUTO_DETECT: &str = "auto";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub target_language: Option<String>,
    pub source_language: Option<String>,
}

impl TranslateRequest {
    fn source(&self) -> &str {
        self.source_language
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(AUTO_DETECT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub success: bool,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub original_text: String,
}

pub fn build_instruction(text: &str, source: &str, target: &str) -> String {
    let direction = if source.eq_ignore_ascii_case(AUTO_DETECT) {
        format!("Translate the following text to {target}. Detect the source language automatically.")
    } else {
        format!("Translate the following text from {source} to {target}.")
    };
    format!(
        "{direction} Return only the translation, without explanations, notes, or any additional commentary.\n\n\"{text}\""
    )
}

pub struct Translate;

impl ProxyRoute for Translate {
    type Input = TranslateRequest;
    type Output = TranslateResponse;

    const CONFIG: RouteConfig = RouteConfig {
        name: "translate",
        limit: RouteLimit::per_window(20),
        max_text_len: 5_000,
        upstream_errors: UpstreamErrorPolicy::Normalize,
    };

    fn shape(&self, state: &AppState, input: &TranslateRequest) -> Result<Outbound> {
        let text = validate_text("Text", input.text.as_deref(), Self::CONFIG.max_text_len)?;
        let target = input
            .target_language
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidInput("Target language is required".to_string()))?;

        let mut request =
            GenerateContentRequest::single_turn(build_instruction(text, input.source(), target));
        request.generation_config = Some(GenerationConfig {
            temperature: Some(0.3),
            max_output_tokens: Some(2048),
            ..Default::default()
        });

        Ok(Outbound {
            model: state.settings.chat_model.clone(),
            request,
        })
    }

    fn extract(
        &self,
        input: TranslateRequest,
        _outbound: Outbound,
        response: GenerateContentResponse,
    ) -> Result<TranslateResponse> {
        let translated = answer_text(&response)?;
        let source_language = input.source().to_string();

        Ok(TranslateResponse {
            success: true,
            translated_text: translated.trim().to_string(),
            source_language,
            target_language: input.target_language.unwrap_or_default().trim().to_string(),
            original_text: input.text.unwrap_or_default(),
        })
    }
}

pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    RawBody(body): RawBody,
) -> Result<Json<TranslateResponse>> {
    pipeline::run(&state, &Translate, &client, &body).await.map(Json)
}
