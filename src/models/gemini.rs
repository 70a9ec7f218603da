use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::traits::{ChatModel, ChatProvider};
use super::types::{ModelResponse, TokenUsage};
use crate::app::GeminiConfig;
use crate::constants::{HEALTH_CHECK_TIMEOUT_SECS, HTTP_CONNECT_TIMEOUT_SECS};
use crate::utils::{log_debug, ChatError};

/// Gemini REST endpoint. Cheap to clone; every chat shares the HTTP client.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    image_model: String,
}

impl GeminiProvider {
    /// Build a provider from configuration. A missing API key or an HTTP
    /// client that cannot be constructed is a setup failure.
    pub fn from_config(config: &GeminiConfig) -> Result<Self, ChatError> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Like [`from_config`](Self::from_config), resolving key variables through `lookup`
    pub fn from_config_with(
        config: &GeminiConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ChatError> {
        let api_key = config.resolve_api_key_with(lookup).ok_or_else(|| {
            ChatError::Setup(format!(
                "no Gemini API key found (set {} or gemini.api_key)",
                config.api_key_env
            ))
        })?;

        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Setup(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            image_model: config.image_model.clone(),
        })
    }

    /// Model used for illustrations
    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// POST a `generateContent` request and decode the reply
    pub(crate) async fn generate_content(
        &self,
        model: &str,
        body: &Value,
    ) -> Result<GenerateContentResponse, ChatError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        log_debug(format!("POST {}", url));

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| ChatError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    async fn create_chat(
        &self,
        system_instruction: &str,
        model_id: &str,
    ) -> Result<Box<dyn ChatModel>> {
        if model_id.trim().is_empty() {
            return Err(ChatError::Setup("model identifier is empty".to_string()).into());
        }

        Ok(Box::new(GeminiChat {
            provider: self.clone(),
            model: model_id.to_string(),
            system_instruction: system_instruction.to_string(),
            history: Vec::new(),
        }))
    }

    async fn validate_connection(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .send()
            .await;

        match response {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// One past turn kept client-side and replayed on every request
#[derive(Debug, Clone, PartialEq)]
struct HistoryEntry {
    role: &'static str,
    text: String,
}

/// A Gemini conversation. Holds the full history because the REST API is stateless.
pub struct GeminiChat {
    provider: GeminiProvider,
    model: String,
    system_instruction: String,
    history: Vec<HistoryEntry>,
}

impl GeminiChat {
    fn build_request_body(&self, text: &str) -> Value {
        build_chat_body(&self.system_instruction, &self.history, text)
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    async fn send_message(&mut self, text: &str) -> Result<ModelResponse> {
        let body = self.build_request_body(text);

        let response = self
            .provider
            .generate_content(&self.model, &body)
            .await
            .with_context(|| format!("Gemini chat request to {} failed", self.model))?;

        let content = response.text()?;
        let usage = response.token_usage();

        // Only answered turns become context for the next request
        self.history.push(HistoryEntry {
            role: "user",
            text: text.to_string(),
        });
        self.history.push(HistoryEntry {
            role: "model",
            text: content.clone(),
        });

        Ok(ModelResponse {
            content,
            usage,
            model_name: self.model.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn build_chat_body(system_instruction: &str, history: &[HistoryEntry], text: &str) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|entry| {
            json!({
                "role": entry.role,
                "parts": [{ "text": entry.text }]
            })
        })
        .collect();

    contents.push(json!({
        "role": "user",
        "parts": [{ "text": text }]
    }));

    let mut body = json!({ "contents": contents });
    if !system_instruction.is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{ "text": system_instruction }]
        });
    }
    body
}

/// Map a non-2xx reply onto the error taxonomy
fn classify_failure(status: StatusCode, body: &str) -> ChatError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.trim().to_string());
    let exhausted = parsed
        .as_ref()
        .and_then(|e| e.error.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");

    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        ChatError::Quota(message)
    } else {
        ChatError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

// Response structures for the Gemini REST API

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) usage_metadata: Option<UsageMetadata>,
    pub(crate) prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub(crate) content: Option<CandidateContent>,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub(crate) parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    pub(crate) text: Option<String>,
    pub(crate) inline_data: Option<InlineData>,
    #[serde(default)]
    pub(crate) thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub(crate) mime_type: Option<String>,
    pub(crate) data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, or nothing
    pub(crate) fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate, skipping thought parts.
    /// A reply with no text at all is malformed.
    pub(crate) fn text(&self) -> Result<String, ChatError> {
        let text: String = self
            .first_parts()
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();

        if !text.is_empty() {
            return Ok(text);
        }

        let reason = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
            .map(|r| format!("prompt blocked: {}", r))
            .or_else(|| {
                self.candidates
                    .first()
                    .and_then(|c| c.finish_reason.clone())
                    .map(|r| format!("no text in candidate (finish reason {})", r))
            })
            .unwrap_or_else(|| "response contained no text".to_string());

        Err(ChatError::MalformedResponse(reason))
    }

    pub(crate) fn token_usage(&self) -> Option<TokenUsage> {
        self.usage_metadata.as_ref().map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_body_includes_history_and_system_instruction() {
        let history = vec![
            HistoryEntry {
                role: "user",
                text: "What is a stem cell?".to_string(),
            },
            HistoryEntry {
                role: "model",
                text: "An unspecialized cell.".to_string(),
            },
        ];

        let body = build_chat_body("Be kind.", &history, "Tell me more");

        assert_eq!(
            body,
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "What is a stem cell?" }] },
                    { "role": "model", "parts": [{ "text": "An unspecialized cell." }] },
                    { "role": "user", "parts": [{ "text": "Tell me more" }] }
                ],
                "systemInstruction": { "parts": [{ "text": "Be kind." }] }
            })
        );
    }

    #[test]
    fn test_body_without_system_instruction() {
        let body = build_chat_body("", &[], "hi");
        assert!(body.get("systemInstruction").is_none());
        assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_text_joins_parts_and_skips_thoughts() {
        let response = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "Mesenchymal stem cells " },
                    { "text": "are multipotent." }
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 7, "totalTokenCount": 19 }
        }));

        assert_eq!(response.text().unwrap(), "Mesenchymal stem cells are multipotent.");
        assert_eq!(
            response.token_usage(),
            Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 7,
                total_tokens: 19
            })
        );
    }

    #[test]
    fn test_blocked_prompt_is_malformed() {
        let response = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } }));
        match response.text() {
            Err(ChatError::MalformedResponse(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("Expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_candidate_is_malformed() {
        let response = parse(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        }));
        let err = response.text().unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_classify_quota_by_status_code() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(err.kind(), "quota");
    }

    #[test]
    fn test_classify_quota_by_error_status() {
        let body = r#"{"error":{"code":403,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        match classify_failure(StatusCode::FORBIDDEN, body) {
            ChatError::Quota(msg) => assert_eq!(msg, "Quota exceeded"),
            other => panic!("Expected quota error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_api_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        match classify_failure(StatusCode::BAD_REQUEST, body) {
            ChatError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("Expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_api_key_is_setup_error() {
        let config = GeminiConfig {
            api_key: Some(String::new()),
            api_key_env: "BETAHEALTH_TEST_NO_SUCH_VAR".to_string(),
            ..GeminiConfig::default()
        };
        match GeminiProvider::from_config_with(&config, |_| None) {
            Err(ChatError::Setup(msg)) => assert!(msg.contains("BETAHEALTH_TEST_NO_SUCH_VAR")),
            Err(other) => panic!("Expected setup error, got {:?}", other),
            Ok(_) => panic!("Expected setup error"),
        }
    }

    #[test]
    fn test_api_key_from_lookup() {
        let config = GeminiConfig {
            api_key_env: "BETAHEALTH_TEST_KEY".to_string(),
            ..GeminiConfig::default()
        };
        let lookup = |name: &str| (name == "BETAHEALTH_TEST_KEY").then(|| "from-env".to_string());
        assert!(GeminiProvider::from_config_with(&config, lookup).is_ok());
    }

    #[tokio::test]
    async fn test_empty_model_id_rejected() {
        let config = GeminiConfig {
            api_key: Some("test-key".to_string()),
            ..GeminiConfig::default()
        };
        let provider = GeminiProvider::from_config(&config).unwrap();
        let err = match provider.create_chat("persona", "  ").await {
            Err(e) => e,
            Ok(_) => panic!("Expected setup error"),
        };
        assert_eq!(ChatError::kind_of(&err), "setup");
    }
}
