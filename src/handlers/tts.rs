use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ClientId, RawBody};
use crate::error::{ApiError, Result};
use crate::models::{GenerateContentRequest, GenerateContentResponse, GenerationConfig, SpeechConfig};
use crate::pipeline::{
    self, Outbound, ProxyRoute, RouteConfig, UpstreamErrorPolicy, validate_model, validate_text,
};
use crate::rate_limit::RouteLimit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsResponse {
    pub success: bool,
    // Base64 audio exactly as the upstream returned it
    pub audio_data: String,
    pub text: String,
    pub model: String,
    pub voice: String,
}

pub struct Tts;

impl Tts {
    fn voice<'a>(state: &'a AppState, input: &'a TtsRequest) -> &'a str {
        input
            .voice
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&state.settings.tts_voice)
    }
}

impl ProxyRoute for Tts {
    type Input = TtsRequest;
    type Output = TtsResponse;

    const CONFIG: RouteConfig = RouteConfig {
        name: "tts",
        limit: RouteLimit::per_window(10),
        max_text_len: 2_000,
        upstream_errors: UpstreamErrorPolicy::Normalize,
    };

    fn shape(&self, state: &AppState, input: &TtsRequest) -> Result<Outbound> {
        let text = validate_text("Text", input.text.as_deref(), Self::CONFIG.max_text_len)?;
        let model = validate_model(
            input
                .model
                .as_deref()
                .unwrap_or(&state.settings.tts_model),
        )?
        .to_string();

        let mut request = GenerateContentRequest::single_turn(text);
        request.generation_config = Some(GenerationConfig {
            response_modalities: Some(vec!["AUDIO".to_string()]),
            speech_config: Some(SpeechConfig::prebuilt(Self::voice(state, input))),
            ..Default::default()
        });

        Ok(Outbound { model, request })
    }

    fn extract(
        &self,
        input: TtsRequest,
        outbound: Outbound,
        response: GenerateContentResponse,
    ) -> Result<TtsResponse> {
        let parts = response
            .first_parts()
            .ok_or(ApiError::MalformedUpstreamResponse)?;
        let audio = parts
            .first()
            .and_then(|p| p.inline_data.as_ref())
            .map(|d| d.data.clone())
            .filter(|d| !d.is_empty())
            .ok_or(ApiError::NoAudioGenerated)?;

        let voice = outbound
            .request
            .generation_config
            .as_ref()
            .and_then(|c| c.speech_config.as_ref())
            .map(|s| s.voice_config.prebuilt_voice_config.voice_name.clone())
            .unwrap_or_default();

        Ok(TtsResponse {
            success: true,
            audio_data: audio,
            text: input.text.unwrap_or_default(),
            model: outbound.model,
            voice,
        })
    }
}

pub async fn tts_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    RawBody(body): RawBody,
) -> Result<Json<TtsResponse>> {
    pipeline::run(&state, &Tts, &client, &body).await.map(Json)
}
