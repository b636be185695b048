use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ClientId, RawBody};
use crate::error::{ApiError, Result};
use crate::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, SafetySetting,
    ThinkingConfig,
};
use crate::pipeline::{
    self, Outbound, ProxyRoute, RouteConfig, UpstreamErrorPolicy, join_text, validate_model,
    validate_text,
};
use crate::rate_limit::RouteLimit;
use crate::state::AppState;

// model generations that can return reasoning traces
const THINKING_MODEL_TOKENS: [&str; 2] = ["2.5", "gemini-3"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub prompt: Option<String>,
    pub system_prompt: Option<String>,
    pub conversation_history: Option<Vec<Content>>,
    pub model: Option<String>,
    pub enable_thinking: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,
    pub is_thinking: bool,
    pub model: String,
}

pub fn supports_thinking(model: &str) -> bool {
    THINKING_MODEL_TOKENS.iter().any(|token| model.contains(token))
}

pub struct Chat;

impl ProxyRoute for Chat {
    type Input = ChatRequest;
    type Output = ChatResponse;

    const CONFIG: RouteConfig = RouteConfig {
        name: "chat",
        limit: RouteLimit::per_window(30),
        max_text_len: 100_000,
        upstream_errors: UpstreamErrorPolicy::Normalize,
    };

    fn shape(&self, state: &AppState, input: &ChatRequest) -> Result<Outbound> {
        let prompt = validate_text("Prompt", input.prompt.as_deref(), Self::CONFIG.max_text_len)?;
        let model = validate_model(
            input
                .model
                .as_deref()
                .unwrap_or(&state.settings.chat_model),
        )?
        .to_string();

        let mut contents = input.conversation_history.clone().unwrap_or_default();
        contents.push(Content::user(prompt));

        let include_thoughts = input.enable_thinking.unwrap_or(false) && supports_thinking(&model);
        let request = GenerateContentRequest {
            contents,
            system_instruction: input
                .system_prompt
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(Content::instruction),
            generation_config: Some(GenerationConfig {
                temperature: Some(0.7),
                top_k: Some(40),
                top_p: Some(0.95),
                max_output_tokens: Some(8192),
                thinking_config: include_thoughts.then_some(ThinkingConfig {
                    include_thoughts: true,
                }),
                ..Default::default()
            }),
            safety_settings: SafetySetting::block_medium_and_above(),
        };

        Ok(Outbound { model, request })
    }

    fn extract(
        &self,
        _input: ChatRequest,
        outbound: Outbound,
        response: GenerateContentResponse,
    ) -> Result<ChatResponse> {
        let is_thinking = outbound.request.includes_thoughts();
        let parts = response
            .first_parts()
            .ok_or(ApiError::MalformedUpstreamResponse)?;

        let (text, thoughts) = if is_thinking {
            let (thought_parts, answer_parts): (Vec<_>, Vec<_>) =
                parts.iter().partition(|p| p.is_thought());
            let thoughts = join_text(thought_parts.into_iter());
            (
                join_text(answer_parts.into_iter()),
                Some(thoughts).filter(|t| !t.trim().is_empty()),
            )
        } else {
            (join_text(parts.iter().filter(|p| !p.is_thought())), None)
        };

        if text.trim().is_empty() {
            return Err(ApiError::EmptyResult);
        }

        Ok(ChatResponse {
            success: true,
            response: text,
            thoughts,
            is_thinking,
            model: outbound.model,
        })
    }
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    RawBody(body): RawBody,
) -> Result<Json<ChatResponse>> {
    pipeline::run(&state, &Chat, &client, &body).await.map(Json)
}
