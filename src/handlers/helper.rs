use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ClientId, RawBody};
use crate::error::Result;
use crate::models::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use crate::pipeline::{
    self, Outbound, ProxyRoute, RouteConfig, UpstreamErrorPolicy, answer_text, validate_text,
};
use crate::rate_limit::RouteLimit;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[default]
    General,
    Code,
    Creative,
    Analysis,
}

impl QueryKind {
    pub fn instruction(self) -> &'static str {
        match self {
            QueryKind::General => {
                "You are a helpful AI assistant. Provide clear, accurate, and concise responses."
            }
            QueryKind::Code => {
                "You are an expert programming assistant. Provide clean, well-documented code with brief explanations of how it works."
            }
            QueryKind::Creative => {
                "You are a creative writing assistant. Be imaginative, engaging, and original while staying on topic."
            }
            QueryKind::Analysis => {
                "You are an analytical assistant. Provide thorough, structured analysis with clear reasoning and conclusions."
            }
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            QueryKind::Creative => 0.8,
            _ => 0.7,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HelperRequest {
    pub query: Option<String>,
    pub context: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<QueryKind>,
}

#[derive(Debug, Serialize)]
pub struct HelperResponse {
    pub success: bool,
    pub data: HelperData,
}

#[derive(Debug, Serialize)]
pub struct HelperData {
    pub response: String,
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub timestamp: String,
}

pub fn build_prompt(kind: QueryKind, context: Option<&str>, query: &str) -> String {
    let mut prompt = format!("{}\n\n", kind.instruction());
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("Context: {context}\n\n"));
    }
    prompt.push_str(&format!("User query: {query}"));
    prompt
}

pub struct Helper;

impl ProxyRoute for Helper {
    type Input = HelperRequest;
    type Output = HelperResponse;

    const CONFIG: RouteConfig = RouteConfig {
        name: "helper",
        limit: RouteLimit::per_window(25),
        max_text_len: 4_000,
        upstream_errors: UpstreamErrorPolicy::PassthroughStatus,
    };

    fn shape(&self, state: &AppState, input: &HelperRequest) -> Result<Outbound> {
        let query = validate_text("Query", input.query.as_deref(), Self::CONFIG.max_text_len)?;
        let kind = input.kind.unwrap_or_default();

        let mut request =
            GenerateContentRequest::single_turn(build_prompt(kind, input.context.as_deref(), query));
        request.generation_config = Some(GenerationConfig {
            temperature: Some(kind.temperature()),
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
        input: HelperRequest,
        _outbound: Outbound,
        response: GenerateContentResponse,
    ) -> Result<HelperResponse> {
        Ok(HelperResponse {
            success: true,
            data: HelperData {
                response: answer_text(&response)?,
                kind: input.kind.unwrap_or_default(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        })
    }
}

pub async fn helper_handler(
    State(state): State<Arc<AppState>>,
    ClientId(client): ClientId,
    RawBody(body): RawBody,
) -> Result<Json<HelperResponse>> {
    pipeline::run(&state, &Helper, &client, &body).await.map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_layers_template_context_and_query() {
        let prompt = build_prompt(QueryKind::Code, Some("Rust project"), "Reverse a string");

        assert!(prompt.starts_with(QueryKind::Code.instruction()));
        let context_at = prompt.find("Context: Rust project").unwrap();
        let query_at = prompt.find("User query: Reverse a string").unwrap();
        assert!(context_at < query_at);
    }

    #[test]
    fn blank_context_is_omitted() {
        let prompt = build_prompt(QueryKind::General, Some("   "), "hi");
        assert!(!prompt.contains("Context:"));
    }

    #[test]
    fn creative_runs_hotter() {
        assert_eq!(QueryKind::Creative.temperature(), 0.8);
        assert_eq!(QueryKind::Analysis.temperature(), 0.7);
        assert_eq!(QueryKind::General.temperature(), 0.7);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let parsed = serde_json::from_str::<HelperRequest>(r#"{"query":"x","type":"poetry"}"#);
        assert!(parsed.is_err());

        let parsed: HelperRequest = serde_json::from_str(r#"{"query":"x"}"#).unwrap();
        assert_eq!(parsed.kind, None);
    }
}
