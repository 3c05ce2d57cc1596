//! A2A protocol types and JSON-RPC envelopes

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "0.2.6";

/// JSON-RPC and A2A error codes
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const TASK_NOT_FOUND: i64 = -32001;
    pub const TASK_NOT_CANCELABLE: i64 = -32002;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcId {
    String(String),
    Number(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Option<JsonRpcId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn task_not_found(id: &str) -> Self {
        Self::new(codes::TASK_NOT_FOUND, format!("Task not found: {}", id))
    }

    pub fn task_not_cancelable(id: &str) -> Self {
        Self::new(
            codes::TASK_NOT_CANCELABLE,
            format!("Task cannot be canceled: {}", id),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<JsonRpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<JsonRpcId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<JsonRpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub parts: Vec<Part>,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default = "message_kind")]
    pub kind: String,
}

fn message_kind() -> String {
    "message".to_string()
}

impl Message {
    pub fn agent_text(text: impl Into<String>, context_id: &str, task_id: &str) -> Self {
        Self {
            role: MessageRole::Agent,
            parts: vec![Part::Text { text: text.into() }],
            message_id: Uuid::new_v4().to_string(),
            context_id: Some(context_id.to_string()),
            task_id: Some(task_id.to_string()),
            kind: message_kind(),
        }
    }

    /// Text parts joined by newlines
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::Data { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `message/send` and `message/stream` parameters
#[derive(Debug, Clone, Deserialize)]
pub struct MessageSendParams {
    pub message: Message,
}

/// `tasks/get` and `tasks/cancel` parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    pub id: String,
    #[serde(default)]
    pub history_length: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    pub timestamp: String,
}

impl TaskStatus {
    pub fn new(state: TaskState, message: Option<Message>) -> Self {
        Self {
            state,
            message,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parts: Vec<Part>,
}

impl Artifact {
    /// The single text artifact every finished task carries
    pub fn current_result(text: impl Into<String>) -> Self {
        Self {
            artifact_id: Uuid::new_v4().to_string(),
            name: "current_result".to_string(),
            description: Some("Result of request to agent.".to_string()),
            parts: vec![Part::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub history: Vec<Message>,
    pub kind: String,
}

impl Task {
    /// New submitted task for an incoming user message
    pub fn submitted(message: &Message) -> Self {
        let id = Uuid::new_v4().to_string();
        let context_id = message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut message = message.clone();
        message.task_id = Some(id.clone());
        message.context_id = Some(context_id.clone());

        Self {
            id,
            context_id,
            status: TaskStatus::new(TaskState::Submitted, None),
            artifacts: Vec::new(),
            history: vec![message],
            kind: "task".to_string(),
        }
    }

    pub fn working(&mut self) -> TaskStatusUpdateEvent {
        let message = Message::agent_text("💭 Analyzing...", &self.context_id, &self.id);
        self.status = TaskStatus::new(TaskState::Working, Some(message));
        TaskStatusUpdateEvent::new(self, false)
    }

    pub fn complete(&mut self, text: String) -> TaskArtifactUpdateEvent {
        let artifact = Artifact::current_result(text);
        self.artifacts = vec![artifact.clone()];
        self.status = TaskStatus::new(TaskState::Completed, None);
        TaskArtifactUpdateEvent {
            task_id: self.id.clone(),
            context_id: self.context_id.clone(),
            artifact,
            append: false,
            last_chunk: true,
            kind: "artifact-update".to_string(),
        }
    }

    pub fn fail(&mut self, error: &str) -> TaskStatusUpdateEvent {
        let message = Message::agent_text(format!("❌ Error: {}", error), &self.context_id, &self.id);
        self.status = TaskStatus::new(TaskState::Failed, Some(message));
        TaskStatusUpdateEvent::new(self, true)
    }

    /// Copy with the history trimmed to the last `length` messages
    pub fn with_history_length(&self, length: Option<usize>) -> Self {
        let mut task = self.clone();
        if let Some(length) = length {
            let skip = task.history.len().saturating_sub(length);
            task.history.drain(..skip);
        }
        task
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub status: TaskStatus,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub kind: String,
}

impl TaskStatusUpdateEvent {
    pub fn new(task: &Task, is_final: bool) -> Self {
        Self {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            status: task.status.clone(),
            is_final,
            kind: "status-update".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    pub task_id: String,
    pub context_id: String,
    pub artifact: Artifact,
    pub append: bool,
    pub last_chunk: bool,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub protocol_version: String,
    pub preferred_transport: String,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub capabilities: AgentCapabilities,
    pub skills: Vec<AgentSkill>,
}

fn skill(id: &str, name: &str, description: &str, tags: &[&str], examples: &[String]) -> AgentSkill {
    AgentSkill {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        examples: examples.to_vec(),
    }
}

impl AgentCard {
    /// Card advertised at `url`
    pub fn new(url: String) -> Self {
        use crate::token::addresses::{BONK, SOL, USDC_SOL};

        let skills = vec![
            skill(
                "token_risk_analysis",
                "DeFi Token Risk Analysis",
                "Analyzes cryptocurrency tokens for rug-pull risk using security metrics, \
                 holder distribution, liquidity, and trading patterns",
                &["defi", "risk-assessment", "rug-pull-detection", "token-security"],
                &[
                    format!("Analyze this token for risk: {}", SOL),
                    format!("Check the rug-pull risk for token {}", USDC_SOL),
                    format!("analyze {}", BONK),
                ],
            ),
            skill(
                "holder_analysis",
                "Holder Distribution Analysis",
                "Analyzes token holder concentration and distribution patterns to identify \
                 whale risks and potential rug-pull indicators",
                &["defi", "holders", "concentration", "whale-analysis"],
                &[
                    format!("Show me the top holders for this token: {}", SOL),
                    format!("holders {}", BONK),
                ],
            ),
            skill(
                "trending_tokens",
                "Trending Tokens Discovery",
                "Identifies currently trending tokens on Solana based on price change and \
                 trading volume",
                &["defi", "trending", "discovery", "market-analysis"],
                &[
                    "What are the trending tokens right now?".to_string(),
                    "trending".to_string(),
                ],
            ),
        ];

        Self {
            name: "DeFi Risk Assessment Agent".to_string(),
            description: "AI-powered agent that analyzes cryptocurrency tokens for rug-pull \
                          risk using DeFi data APIs and Google Gemini"
                .to_string(),
            url,
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            preferred_transport: "JSONRPC".to_string(),
            default_input_modes: vec!["text/plain".to_string()],
            default_output_modes: vec!["text/plain".to_string()],
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
            },
            skills,
        }
    }
}
