//! Google Gemini `generateContent` client

use super::{Content, LanguageModel, LlmError, ModelRequest, ModelResponse, Role, TokenUsage};
use crate::config::ModelConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http: Client,
    url: Url,
    api_key: SecretString,
    config: ModelConfig,
}

impl GeminiClient {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: SecretString,
        config: ModelConfig,
    ) -> Result<Self, LlmError> {
        let raw = format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            config.model
        );
        let url = Url::parse(&raw)
            .map_err(|e| LlmError::NotConfigured(format!("invalid Gemini URL {}: {}", raw, e)))?;
        Ok(Self {
            http,
            url,
            api_key,
            config,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let body = request_body(request, &self.config);
        tracing::debug!(
            model = %self.config.model,
            turns = request.contents.len(),
            tools = request.tools.len(),
            "Sending Gemini request"
        );

        let response = self
            .http
            .post(self.url.clone())
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed = parse_response(&text)?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                output_tokens = usage.output_tokens,
                "Gemini usage"
            );
        }
        Ok(parsed)
    }
}

/// Wire body for `generateContent`
fn request_body(request: &ModelRequest, config: &ModelConfig) -> Value {
    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        "contents": request.contents,
        "generationConfig": {
            "temperature": config.temperature,
            "maxOutputTokens": config.max_output_tokens,
        },
    });

    if !request.tools.is_empty() {
        body["tools"] = json!([{ "functionDeclarations": request.tools }]);
        body["toolConfig"] = json!({ "functionCallingConfig": { "mode": "AUTO" } });
    }
    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn parse_response(text: &str) -> Result<ModelResponse, LlmError> {
    let response: GenerateResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Malformed(e.to_string()))?;

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(LlmError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?;

    let finish_reason = candidate.finish_reason;
    let content = match candidate.content {
        Some(content) if !content.parts.is_empty() => Content {
            role: Role::Model,
            ..content
        },
        _ => {
            return Err(match finish_reason.as_deref() {
                Some(reason @ ("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT")) => {
                    LlmError::Blocked(reason.to_string())
                }
                _ => LlmError::EmptyResponse,
            })
        }
    };

    Ok(ModelResponse {
        content,
        finish_reason,
        usage: response.usage_metadata.map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        }),
    })
}

/// Extract `error.message` from a Gemini error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
