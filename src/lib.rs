//! DeFi Risk Agent
//!
//! An AI-assisted rug-pull risk assessor for Solana and EVM tokens that:
//! - Gathers security, holder, liquidity and audit signals from public DeFi APIs
//! - Scores them with a deterministic weighted matrix
//! - Lets Google Gemini call the same data sources as tools to write the report
//!
//! # Security Model
//!
//! - Token addresses are validated before any network call
//! - Every tool and model call passes through the interceptor chain
//! - API keys are held as secrets and never serialized or logged
//! - Tool and model calls can be recorded to a JSONL audit trail

pub mod agent;
pub mod config;
pub mod interceptors;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod report;
pub mod scoring;
pub mod server;
pub mod signals;
pub mod sources;
pub mod token;
pub mod tools;

mod error;

// Re-export commonly used types
pub use agent::RiskAgent;
pub use config::{Config, GOOGLE_API_KEY_ENV};
pub use error::{Error, Result};
pub use llm::{LanguageModel, LlmError};
pub use report::{QuickReport, RiskReport, TokenOverview};
pub use scoring::{DataQuality, RiskAssessment, RiskLevel, Verdict};
pub use sources::{MarketData, SourceError};
pub use token::{Chain, TokenAddress};
