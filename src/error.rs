//! Error types for the DeFi risk agent

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid token address: {0}")]
    InvalidAddress(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Data source error: {0}")]
    Source(#[from] crate::sources::SourceError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Agent not initialized")]
    NotInitialized,

    #[error("Server error: {0}")]
    Server(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
