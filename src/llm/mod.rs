//! Language model abstraction
//!
//! The agent talks to the model through [`LanguageModel`] so tests can script
//! responses. Message types follow the Gemini `generateContent` wire format:
//! a conversation is a list of [`Content`] turns made of [`Part`]s, and a
//! part carries text, a function call, or a function response.

mod gemini;

pub use gemini::GeminiClient;

use crate::tools::FunctionDeclaration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Model request timed out")]
    Timeout,

    #[error("Model rate limit exceeded")]
    RateLimited,

    #[error("Model API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Model request failed: {0}")]
    Network(String),

    #[error("Model response could not be decoded: {0}")]
    Malformed(String),

    #[error("Model returned no candidates")]
    EmptyResponse,

    #[error("Prompt blocked by the model: {0}")]
    Blocked(String),

    #[error("Model call refused by interceptor: {0}")]
    Intercepted(String),

    #[error("Model client not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One piece of a turn; exactly one of text, function call or function
/// response is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Marks a thought summary from a thinking model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Opaque reasoning state; must be echoed back unchanged on the next call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }
}

/// A conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Function results are sent back on a user turn
    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: Role::User,
            parts: responses
                .into_iter()
                .map(|r| Part {
                    function_response: Some(r),
                    ..Part::default()
                })
                .collect(),
        }
    }

    /// Concatenated text parts, without thought summaries
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .collect()
    }
}

/// Everything sent on one model call
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub contents: Vec<Content>,
    pub tools: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub output_tokens: u64,
}

/// First candidate of a model reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResponse {
    pub content: Content,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Content::model(vec![Part::text(text)]),
            finish_reason: Some("STOP".to_string()),
            usage: None,
        }
    }

    pub fn calls(calls: Vec<(&str, Value)>) -> Self {
        Self {
            content: Content::model(
                calls
                    .into_iter()
                    .map(|(name, args)| Part::function_call(name, args))
                    .collect(),
            ),
            finish_reason: Some("STOP".to_string()),
            usage: None,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Model returning queued responses and recording every request
    #[derive(Default)]
    pub(crate) struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
        pub requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(responses: Vec<Result<ModelResponse, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }
    }

    #[test]
    fn thinking_parts_survive_a_round_trip() {
        let wire = json!({
            "role": "model",
            "parts": [
                { "text": "checking authorities first", "thought": true },
                {
                    "functionCall": { "name": "token_security", "args": { "token_address": "abc" } },
                    "thoughtSignature": "c2lnbmF0dXJl"
                }
            ]
        });
        let content: Content = serde_json::from_value(wire.clone()).unwrap();

        assert_eq!(content.text(), "");
        assert_eq!(content.function_calls().len(), 1);
        assert_eq!(serde_json::to_value(&content).unwrap(), wire);
    }

    #[test]
    fn parts_serialize_in_wire_format() {
        let content = Content::model(vec![Part::function_call(
            "token_security",
            json!({ "token_address": "abc" }),
        )]);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "model",
                "parts": [{ "functionCall": { "name": "token_security", "args": { "token_address": "abc" } } }]
            })
        );
    }

    #[test]
    fn function_responses_use_the_user_role() {
        let content = Content::function_responses(vec![FunctionResponse {
            name: "risk_score".to_string(),
            response: json!({ "status": "success" }),
        }]);
        assert_eq!(content.role, Role::User);
        assert!(content.parts[0].function_response.is_some());
        assert!(content.text().is_empty());
    }

    #[test]
    fn text_joins_text_parts() {
        let content = Content::model(vec![
            Part::text("Risk "),
            Part::function_call("x", Value::Null),
            Part::text("Score"),
        ]);
        assert_eq!(content.text(), "Risk Score");
        assert_eq!(content.function_calls().len(), 1);
    }
}
