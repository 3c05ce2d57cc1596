//! Tools the model can call during an analysis
//!
//! Every data-source query is wrapped as a tool with a name, a description,
//! a JSON input schema and an async invocation function. Typed tools implement
//! [`RiskTool`]; the registry stores them behind the object-safe [`DynTool`]
//! so discovered MCP tools sit next to the built-in ones.

mod market;
mod mcp;
mod onchain;
mod risk_score;
pub mod schema;
mod security;
mod types;

pub use market::{LiquiditySnapshotTool, TokenDetailsTool, TradingMetricsTool, TrendingTokensTool};
pub use mcp::{discover_mcp_tools, McpTool};
pub use onchain::{HolderDistributionTool, TokenMetadataTool, TransactionHistoryTool};
pub use risk_score::RiskScoreTool;
pub use security::{CertikAuditTool, RugcheckTool, SecurityIncidentsTool, TokenSecurityTool};
pub use types::{ChainInput, IncidentInput, LimitedTokenInput, TokenInput};

use crate::config::Config;
use crate::interceptors::{is_valid_tool_name, InterceptorChain, InterceptorDecision, ToolCallContext};
use crate::sources::{MarketData, SourceError};
use async_trait::async_trait;
use schemars::{JsonSchema, SchemaGenerator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const TOOL_TOKEN_SECURITY: &str = "token_security";
pub const TOOL_TOKEN_METADATA: &str = "token_metadata";
pub const TOOL_RUGCHECK_ANALYSIS: &str = "rugcheck_analysis";
pub const TOOL_SECURITY_INCIDENTS: &str = "security_incidents";
pub const TOOL_CERTIK_AUDIT: &str = "certik_audit";
pub const TOOL_HOLDER_DISTRIBUTION: &str = "holder_distribution";
pub const TOOL_TRANSACTION_HISTORY: &str = "transaction_history";
pub const TOOL_LIQUIDITY_SNAPSHOT: &str = "liquidity_snapshot";
pub const TOOL_TRADING_METRICS: &str = "trading_metrics";
pub const TOOL_TOKEN_DETAILS: &str = "token_details";
pub const TOOL_TRENDING_TOKENS: &str = "trending_tokens";
pub const TOOL_RISK_SCORE: &str = "risk_score";

/// Prefix given to every tool discovered on the Cambrian MCP server
pub const MCP_TOOL_PREFIX: &str = "cambrian_";

/// Errors raised while invoking a tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Blocked: {0}")]
    Blocked(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    /// Short machine-readable kind used in error payloads
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArgument(_) => "invalid_argument",
            ToolError::Source(e) => e.kind(),
            ToolError::Blocked(_) => "blocked",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Execution(_) => "execution",
        }
    }
}

/// A typed tool with a derived input schema
#[async_trait]
pub trait RiskTool: Send + Sync + 'static {
    const NAME: &'static str;

    type Input: DeserializeOwned + JsonSchema + Send;

    fn description(&self) -> &'static str;

    async fn execute(&self, input: Self::Input) -> Result<Value, ToolError>;

    fn input_schema(&self) -> Value {
        let schema = SchemaGenerator::default().into_root_schema_for::<Self::Input>();
        serde_json::to_value(schema).unwrap_or_else(|_| json!({ "type": "object" }))
    }
}

/// Object-safe view of a tool, as stored in the registry
#[async_trait]
pub trait DynTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> Value;

    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

#[async_trait]
impl<T: RiskTool> DynTool for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        RiskTool::description(self)
    }

    fn input_schema(&self) -> Value {
        RiskTool::input_schema(self)
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        // Models sometimes send null for tools without parameters
        let args = if args.is_null() { json!({}) } else { args };
        let input: T::Input = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArgument(e.to_string()))?;
        self.execute(input).await
    }
}

/// Function declaration handed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Named tools plus the interceptors every call passes through
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn DynTool>>,
    interceptors: InterceptorChain,
}

impl ToolRegistry {
    pub fn new(interceptors: InterceptorChain) -> Self {
        Self {
            tools: BTreeMap::new(),
            interceptors,
        }
    }

    /// Registry holding the built-in tools backed by `market`
    pub fn with_builtin(
        market: Arc<dyn MarketData>,
        config: &Config,
        interceptors: InterceptorChain,
    ) -> Result<Self, ToolError> {
        let mut registry = Self::new(interceptors);
        for tool in builtin_tools(market, config) {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn DynTool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if !is_valid_tool_name(&name) {
            return Err(ToolError::InvalidArgument(format!(
                "invalid tool name '{}'",
                name
            )));
        }
        if self.tools.contains_key(&name) {
            return Err(ToolError::InvalidArgument(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Drop every tool whose name starts with `prefix`
    pub fn remove_prefixed(&mut self, prefix: &str) -> usize {
        let before = self.tools.len();
        self.tools.retain(|name, _| !name.starts_with(prefix));
        before - self.tools.len()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Declarations with schemas Gemini accepts
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools
            .values()
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: schema::for_gemini(&tool.input_schema()),
            })
            .collect()
    }

    /// Run a tool and always return JSON for the model.
    ///
    /// Failures of any kind become `{"status": "error", ...}` objects.
    pub async fn invoke(&self, name: &str, args: Value) -> Value {
        match self.try_invoke(name, args).await {
            Ok(value) => value,
            Err(e) => error_payload(name, &e),
        }
    }

    /// Run a tool through the interceptor chain
    pub async fn try_invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        if !args.is_null() && !args.is_object() {
            return Err(ToolError::InvalidArgument(
                "arguments must be a JSON object".to_string(),
            ));
        }

        let context = ToolCallContext::new(name, args.clone());
        if let InterceptorDecision::Block(reason) = self.interceptors.before_tool(&context).await {
            let blocked = Err(ToolError::Blocked(reason.clone()));
            self.interceptors.after_tool(&context, &blocked, 0).await;
            return Err(ToolError::Blocked(reason));
        }

        let start = Instant::now();
        let result = tool.call(args).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => tracing::debug!(tool = %name, duration_ms, "Tool call succeeded"),
            Err(e) => tracing::warn!(tool = %name, duration_ms, error = %e, "Tool call failed"),
        }

        self.interceptors
            .after_tool(&context, &result, duration_ms)
            .await;
        result
    }
}

/// Uniform error object returned to the model
pub fn error_payload(tool: &str, error: &ToolError) -> Value {
    json!({
        "status": "error",
        "tool": tool,
        "kind": error.kind(),
        "message": error.to_string(),
    })
}

/// Every built-in tool, backed by `market`
pub fn builtin_tools(market: Arc<dyn MarketData>, config: &Config) -> Vec<Arc<dyn DynTool>> {
    vec![
        Arc::new(TokenSecurityTool::new(market.clone())),
        Arc::new(TokenMetadataTool::new(market.clone())),
        Arc::new(RugcheckTool::new(market.clone())),
        Arc::new(SecurityIncidentsTool::new(market.clone())),
        Arc::new(CertikAuditTool::new(market.clone())),
        Arc::new(HolderDistributionTool::new(
            market.clone(),
            config.agent.holder_limit,
        )),
        Arc::new(TransactionHistoryTool::new(
            market.clone(),
            config.agent.transaction_limit,
        )),
        Arc::new(LiquiditySnapshotTool::new(market.clone())),
        Arc::new(TradingMetricsTool::new(market.clone())),
        Arc::new(TokenDetailsTool::new(market.clone())),
        Arc::new(TrendingTokensTool::new(market.clone())),
        Arc::new(RiskScoreTool::new(
            market,
            config.agent.clone(),
            config.risk.clone(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyDefaultMode, PolicySettings};
    use crate::interceptors::{PolicyConfig, PolicyInterceptor};
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    fn registry(market: FixtureMarket) -> ToolRegistry {
        ToolRegistry::with_builtin(
            Arc::new(market),
            &Config::default(),
            InterceptorChain::new(),
        )
        .unwrap()
    }

    #[test]
    fn builtin_tools_are_all_registered() {
        let registry = registry(FixtureMarket::healthy());
        assert_eq!(registry.len(), 12);
        for name in [
            TOOL_TOKEN_SECURITY,
            TOOL_TOKEN_METADATA,
            TOOL_RUGCHECK_ANALYSIS,
            TOOL_SECURITY_INCIDENTS,
            TOOL_CERTIK_AUDIT,
            TOOL_HOLDER_DISTRIBUTION,
            TOOL_TRANSACTION_HISTORY,
            TOOL_LIQUIDITY_SNAPSHOT,
            TOOL_TRADING_METRICS,
            TOOL_TOKEN_DETAILS,
            TOOL_TRENDING_TOKENS,
            TOOL_RISK_SCORE,
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let market: Arc<dyn MarketData> = Arc::new(FixtureMarket::healthy());
        let mut registry = ToolRegistry::default();
        registry
            .register(Arc::new(TrendingTokensTool::new(market.clone())))
            .unwrap();
        let err = registry
            .register(Arc::new(TrendingTokensTool::new(market)))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument(_)));
    }

    #[test]
    fn declarations_have_object_parameters() {
        let registry = registry(FixtureMarket::healthy());
        let declarations = registry.declarations();
        assert_eq!(declarations.len(), registry.len());
        for declaration in declarations {
            assert_eq!(declaration.parameters["type"], "object");
            assert!(!declaration.description.is_empty());
            assert!(declaration.parameters.get("$schema").is_none());
        }
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_object() {
        let registry = registry(FixtureMarket::healthy());
        let value = registry.invoke("does_not_exist", json!({})).await;
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "unknown_tool");
        assert_eq!(value["tool"], "does_not_exist");
    }

    #[tokio::test]
    async fn bad_arguments_return_error_object() {
        let registry = registry(FixtureMarket::healthy());
        let value = registry
            .invoke(TOOL_TOKEN_SECURITY, json!({ "token_address": 42 }))
            .await;
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "invalid_argument");
    }

    #[tokio::test]
    async fn invalid_address_never_reaches_provider() {
        let market = Arc::new(FixtureMarket::healthy());
        let registry = ToolRegistry::with_builtin(
            market.clone(),
            &Config::default(),
            InterceptorChain::new(),
        )
        .unwrap();
        let value = registry
            .invoke(TOOL_TOKEN_SECURITY, json!({ "token_address": "not-an-address" }))
            .await;
        assert_eq!(value["status"], "error");
        assert_eq!(market.call_count(), 0);
    }

    #[tokio::test]
    async fn source_failures_become_error_objects() {
        let registry = registry(FixtureMarket::failing());
        let value = registry
            .invoke(TOOL_TOKEN_SECURITY, json!({ "token_address": addresses::BONK }))
            .await;
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "timeout");
    }

    #[tokio::test]
    async fn policy_blocks_before_execution() {
        let market = Arc::new(FixtureMarket::healthy());
        let chain = InterceptorChain::new().with_tool_interceptor(Arc::new(
            PolicyInterceptor::new(PolicyConfig::from_settings(&PolicySettings {
                default_mode: PolicyDefaultMode::DefaultDeny,
                rules: Vec::new(),
            })),
        ));
        let registry =
            ToolRegistry::with_builtin(market.clone(), &Config::default(), chain).unwrap();

        let value = registry
            .invoke(TOOL_TRENDING_TOKENS, json!({}))
            .await;
        assert_eq!(value["kind"], "blocked");
        assert_eq!(market.call_count(), 0);
    }

    #[tokio::test]
    async fn null_arguments_are_accepted_for_empty_input() {
        let registry = registry(FixtureMarket::healthy());
        let value = registry.invoke(TOOL_TRENDING_TOKENS, Value::Null).await;
        assert_eq!(value["status"], "success");
    }
}
