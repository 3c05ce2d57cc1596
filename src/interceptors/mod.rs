//! Tool and LLM call interceptors
//!
//! These interceptors form a governance pipeline that every tool call passes
//! through: the policy decides whether a call may run and the audit log
//! records what ran, with which arguments, and how long it took.

mod audit_log;
mod policy;

pub use audit_log::AuditLogInterceptor;
pub use policy::{is_valid_tool_name, PolicyConfig, PolicyInterceptor};

use crate::config::Config;
use crate::llm::LlmError;
use crate::tools::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Outcome of an interceptor check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorDecision {
    Allow,
    Block(String),
}

/// A tool call about to run
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_name: String,
    pub args: Value,
    /// Unique id for correlating start and completion records
    pub call_id: String,
    /// blake3 digest of the canonical argument JSON
    pub args_digest: String,
}

impl ToolCallContext {
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        let args_digest = hash_json(&args);
        Self {
            tool_name: tool_name.into(),
            args,
            call_id: uuid::Uuid::new_v4().to_string(),
            args_digest,
        }
    }
}

/// A model request about to be sent
#[derive(Debug, Clone)]
pub struct LlmCallContext {
    pub model: String,
    /// Agent operation issuing the call (`analyze`, `chat`, ...)
    pub operation: String,
    pub iteration: usize,
    pub prompt: Value,
}

/// Hex blake3 digest of a JSON value
pub fn hash_json(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[async_trait]
pub trait ToolInterceptor: Send + Sync {
    async fn intercept_tool_call(&self, context: &ToolCallContext)
        -> crate::Result<InterceptorDecision>;

    async fn on_tool_call_complete(
        &self,
        _context: &ToolCallContext,
        _result: &Result<Value, ToolError>,
        _duration_ms: u64,
    ) {
    }
}

#[async_trait]
pub trait LlmInterceptor: Send + Sync {
    async fn intercept_llm_call(&self, _context: &LlmCallContext) -> crate::Result<InterceptorDecision> {
        Ok(InterceptorDecision::Allow)
    }

    async fn on_llm_call_complete(
        &self,
        _context: &LlmCallContext,
        _result: &Result<Value, LlmError>,
        _duration_ms: u64,
    ) {
    }
}

/// Ordered interceptors applied around every tool and model call
#[derive(Clone, Default)]
pub struct InterceptorChain {
    tool: Vec<Arc<dyn ToolInterceptor>>,
    llm: Vec<Arc<dyn LlmInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy first, then the audit log when a path is configured
    pub fn from_config(config: &Config) -> Self {
        let mut chain = Self::new().with_tool_interceptor(Arc::new(PolicyInterceptor::new(
            PolicyConfig::from_settings(&config.policy),
        )));

        if let Some(path) = &config.audit_log_path {
            tracing::info!(path = %path, "Audit logging enabled");
            let audit = Arc::new(AuditLogInterceptor::new(path));
            chain = chain
                .with_tool_interceptor(audit.clone())
                .with_llm_interceptor(audit);
        }

        chain
    }

    pub fn with_tool_interceptor(mut self, interceptor: Arc<dyn ToolInterceptor>) -> Self {
        self.tool.push(interceptor);
        self
    }

    pub fn with_llm_interceptor(mut self, interceptor: Arc<dyn LlmInterceptor>) -> Self {
        self.llm.push(interceptor);
        self
    }

    /// First blocking decision wins; interceptor errors block the call
    pub async fn before_tool(&self, context: &ToolCallContext) -> InterceptorDecision {
        for interceptor in &self.tool {
            match interceptor.intercept_tool_call(context).await {
                Ok(InterceptorDecision::Allow) => {}
                Ok(block) => return block,
                Err(e) => return InterceptorDecision::Block(format!("interceptor error: {}", e)),
            }
        }
        InterceptorDecision::Allow
    }

    pub async fn after_tool(
        &self,
        context: &ToolCallContext,
        result: &Result<Value, ToolError>,
        duration_ms: u64,
    ) {
        for interceptor in &self.tool {
            interceptor
                .on_tool_call_complete(context, result, duration_ms)
                .await;
        }
    }

    pub async fn before_llm(&self, context: &LlmCallContext) -> InterceptorDecision {
        for interceptor in &self.llm {
            match interceptor.intercept_llm_call(context).await {
                Ok(InterceptorDecision::Allow) => {}
                Ok(block) => return block,
                Err(e) => return InterceptorDecision::Block(format!("interceptor error: {}", e)),
            }
        }
        InterceptorDecision::Allow
    }

    pub async fn after_llm(
        &self,
        context: &LlmCallContext,
        result: &Result<Value, LlmError>,
        duration_ms: u64,
    ) {
        for interceptor in &self.llm {
            interceptor
                .on_llm_call_complete(context, result, duration_ms)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BlockAll;

    #[async_trait]
    impl ToolInterceptor for BlockAll {
        async fn intercept_tool_call(
            &self,
            context: &ToolCallContext,
        ) -> crate::Result<InterceptorDecision> {
            Ok(InterceptorDecision::Block(format!("no {}", context.tool_name)))
        }
    }

    #[test]
    fn context_digest_is_stable() {
        let a = ToolCallContext::new("token_details", json!({ "token_address": "x" }));
        let b = ToolCallContext::new("token_details", json!({ "token_address": "x" }));
        assert_eq!(a.args_digest, b.args_digest);
        assert_ne!(a.call_id, b.call_id);
        assert_eq!(a.args_digest.len(), 64);
    }

    #[tokio::test]
    async fn empty_chain_allows() {
        let chain = InterceptorChain::new();
        let ctx = ToolCallContext::new("trending_tokens", json!({}));
        assert_eq!(chain.before_tool(&ctx).await, InterceptorDecision::Allow);
    }

    #[tokio::test]
    async fn first_block_wins() {
        let chain = InterceptorChain::new()
            .with_tool_interceptor(Arc::new(PolicyInterceptor::new(PolicyConfig::allow_all())))
            .with_tool_interceptor(Arc::new(BlockAll));
        let ctx = ToolCallContext::new("trending_tokens", json!({}));
        assert_eq!(
            chain.before_tool(&ctx).await,
            InterceptorDecision::Block("no trending_tokens".to_string())
        );
    }
}
