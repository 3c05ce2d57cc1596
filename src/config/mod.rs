//! Configuration for the DeFi risk agent
//!
//! Settings come from environment variables (a `.env` file is honoured) and
//! can be overridden by a JSON config file. API keys are only ever held as
//! [`SecretString`] and are never serialized.

pub mod endpoints;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

pub use endpoints::ProviderEndpoints;

/// Google AI API key environment variable name
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Environment variable names for optional provider keys and tunables
mod env_vars {
    pub const HELIUS_API_KEY: &str = "HELIUS_API_KEY";
    pub const CERTIK_API_KEY: &str = "CERTIK_API_KEY";
    pub const CAMBRIAN_API_KEY: &str = "CAMBRIAN_API_KEY";

    pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
    pub const GEMINI_TEMPERATURE: &str = "GEMINI_TEMPERATURE";
    pub const GEMINI_MAX_OUTPUT_TOKENS: &str = "GEMINI_MAX_OUTPUT_TOKENS";

    pub const HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
    pub const AGENT_MAX_ITERATIONS: &str = "AGENT_MAX_ITERATIONS";
    pub const AUDIT_LOG_PATH: &str = "AUDIT_LOG_PATH";
    pub const APP_URL: &str = "APP_URL";
}

/// LLM model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Gemini model name
    pub model: String,
    /// Sampling temperature (low for consistent analysis)
    pub temperature: f32,
    /// Output token cap per response
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.2,
            max_output_tokens: 4096,
        }
    }
}

impl ModelConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: env_or(env_vars::GEMINI_MODEL, defaults.model),
            temperature: env_parse(env_vars::GEMINI_TEMPERATURE).unwrap_or(defaults.temperature),
            max_output_tokens: env_parse(env_vars::GEMINI_MAX_OUTPUT_TOKENS)
                .unwrap_or(defaults.max_output_tokens),
        }
    }
}

/// API keys for the LLM and the keyed data providers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeys {
    #[serde(default)]
    pub google: Option<SecretString>,
    #[serde(default)]
    pub helius: Option<SecretString>,
    #[serde(default)]
    pub certik: Option<SecretString>,
    #[serde(default)]
    pub cambrian: Option<SecretString>,
}

impl ApiKeys {
    /// Read every key from the environment, ignoring empty values
    pub fn from_env() -> Self {
        Self {
            google: env_secret(GOOGLE_API_KEY_ENV),
            helius: env_secret(env_vars::HELIUS_API_KEY),
            certik: env_secret(env_vars::CERTIK_API_KEY),
            cambrian: env_secret(env_vars::CAMBRIAN_API_KEY),
        }
    }

    /// Fill keys missing here from `other`
    fn or(self, other: ApiKeys) -> Self {
        Self {
            google: self.google.or(other.google),
            helius: self.helius.or(other.helius),
            certik: self.certik.or(other.certik),
            cambrian: self.cambrian.or(other.cambrian),
        }
    }

    fn redacted(&self) -> Value {
        fn mask(key: &Option<SecretString>) -> Value {
            match key {
                Some(secret) if !secret.expose_secret().is_empty() => json!("[set]"),
                _ => json!(null),
            }
        }
        json!({
            "google": mask(&self.google),
            "helius": mask(&self.helius),
            "certik": mask(&self.certik),
            "cambrian": mask(&self.cambrian),
        })
    }
}

/// Thresholds of the risk scoring matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Below this liquidity (USD) the liquidity factor is critical
    pub liquidity_critical_usd: f64,
    /// Below this liquidity (USD) the liquidity factor is high
    pub liquidity_high_usd: f64,
    /// Below this liquidity (USD) the liquidity factor is medium
    pub liquidity_medium_usd: f64,
    /// Top-10 holder share (percent) above which concentration is critical
    pub holders_critical_pct: f64,
    /// Top-10 holder share (percent) above which concentration is high
    pub holders_high_pct: f64,
    /// Top-10 holder share (percent) above which concentration is medium
    pub holders_medium_pct: f64,
    /// Pairs younger than this (hours) are critical
    pub age_critical_hours: f64,
    /// Pairs younger than this (hours) are high risk
    pub age_high_hours: f64,
    /// Pairs younger than this (days) are medium risk
    pub age_medium_days: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            liquidity_critical_usd: 1_000.0,
            liquidity_high_usd: 10_000.0,
            liquidity_medium_usd: 100_000.0,
            holders_critical_pct: 70.0,
            holders_high_pct: 50.0,
            holders_medium_pct: 30.0,
            age_critical_hours: 1.0,
            age_high_hours: 24.0,
            age_medium_days: 30.0,
        }
    }
}

/// Agent loop and data-gathering limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model round-trips per request
    pub max_iterations: usize,
    /// Per-request HTTP timeout for every upstream call
    pub http_timeout_secs: u64,
    /// Number of holders requested from Helius
    pub holder_limit: u32,
    /// Number of transactions requested from Helius
    pub transaction_limit: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            http_timeout_secs: 10,
            holder_limit: 20,
            transaction_limit: 10,
        }
    }
}

impl AgentSettings {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: env_parse(env_vars::AGENT_MAX_ITERATIONS)
                .unwrap_or(defaults.max_iterations),
            http_timeout_secs: env_parse(env_vars::HTTP_TIMEOUT_SECS)
                .unwrap_or(defaults.http_timeout_secs),
            ..defaults
        }
    }
}

/// A2A server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL advertised in the agent card
    pub app_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10002,
            app_url: None,
        }
    }
}

impl ServerConfig {
    /// URL published in the agent card
    pub fn public_url(&self) -> String {
        self.app_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

/// Default policy behavior for tools without an explicit rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDefaultMode {
    #[default]
    AllowAll,
    DefaultDeny,
}

/// A per-tool policy rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub tool: String,
    pub allowed: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Policy settings for tool execution
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PolicySettings {
    #[serde(default)]
    pub default_mode: PolicyDefaultMode,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM settings
    #[serde(default)]
    pub model: ModelConfig,
    /// API keys (never serialized)
    #[serde(default, skip_serializing)]
    pub keys: ApiKeys,
    /// Provider base URLs
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    /// Scoring thresholds
    #[serde(default)]
    pub risk: RiskThresholds,
    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentSettings,
    /// A2A server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Tool policy
    #[serde(default)]
    pub policy: PolicySettings,
    /// Path to the JSONL audit log of tool calls
    #[serde(default)]
    pub audit_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            keys: ApiKeys::default(),
            endpoints: ProviderEndpoints::default(),
            risk: RiskThresholds::default(),
            agent: AgentSettings::default(),
            server: ServerConfig::default(),
            policy: PolicySettings::default(),
            audit_log_path: None,
        }
    }
}

impl Config {
    /// Build configuration from environment variables
    pub fn from_env() -> Self {
        let server = ServerConfig {
            app_url: std::env::var(env_vars::APP_URL).ok(),
            ..ServerConfig::default()
        };

        Self {
            model: ModelConfig::from_env(),
            keys: ApiKeys::from_env(),
            endpoints: ProviderEndpoints::from_env(),
            risk: RiskThresholds::default(),
            agent: AgentSettings::from_env(),
            server,
            policy: PolicySettings::default(),
            audit_log_path: std::env::var(env_vars::AUDIT_LOG_PATH).ok(),
        }
    }

    /// Load configuration from an optional JSON file, filling API keys from
    /// the environment when the file does not carry them.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::from_env());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Config = serde_json::from_str(&content).map_err(|e| {
            crate::Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.keys = config.keys.or(ApiKeys::from_env());
        Ok(config)
    }

    /// Fail fast when the LLM key is missing
    pub fn validate(&self) -> crate::Result<()> {
        match &self.keys.google {
            Some(key) if !key.expose_secret().trim().is_empty() => {}
            _ => {
                return Err(crate::Error::Config(format!(
                    "{} environment variable is not set. Create a .env file with your \
                     Google AI API key (https://ai.google.dev/gemini-api/docs/api-key)",
                    GOOGLE_API_KEY_ENV
                )))
            }
        }

        if self.agent.max_iterations == 0 {
            return Err(crate::Error::Config(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }

        if self.agent.http_timeout_secs == 0 {
            return Err(crate::Error::Config(
                "agent.http_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// JSON view of the configuration with API keys masked
    pub fn redacted(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        if let Some(map) = value.as_object_mut() {
            map.insert("keys".to_string(), self.keys.redacted());
        }
        value
    }
}

fn env_secret(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
