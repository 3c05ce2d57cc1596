//! Risk agent orchestrator
//!
//! Owns the model, the tool registry and the data providers, and runs the
//! function-calling loop behind every user-facing operation.

use crate::config::Config;
use crate::interceptors::{InterceptorChain, InterceptorDecision, LlmCallContext};
use crate::llm::{
    Content, FunctionCall, FunctionResponse, GeminiClient, LanguageModel, LlmError, ModelRequest,
    ModelResponse,
};
use crate::prompts::{
    analyze_prompt, holders_prompt, iteration_limit_message, system_prompt, trending_prompt,
};
use crate::report::{KeyMetrics, QuickReport, RiskReport, TokenOverview};
use crate::scoring::assess;
use crate::signals::Signals;
use crate::sources::{build_http_client, MarketData, McpClient, ProviderSet};
use crate::token::{Chain, TokenAddress};
use crate::tools::{discover_mcp_tools, ToolRegistry, MCP_TOOL_PREFIX};
use crate::{Error, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// DeFi risk agent
pub struct RiskAgent {
    config: Config,
    model: Option<Arc<dyn LanguageModel>>,
    market: Option<Arc<dyn MarketData>>,
    /// Backends were built by `initialize` and are released by `close`
    owns_backends: bool,
    registry: ToolRegistry,
    mcp: Option<Arc<McpClient>>,
    default_chain: Option<Chain>,
    initialized: bool,
}

impl RiskAgent {
    /// Agent talking to Gemini and the live providers once initialized
    pub fn new(config: Config) -> Self {
        Self {
            config,
            model: None,
            market: None,
            owns_backends: true,
            registry: ToolRegistry::default(),
            mcp: None,
            default_chain: None,
            initialized: false,
        }
    }

    /// Agent over caller-supplied model and data backends
    pub fn with_backends(
        config: Config,
        model: Arc<dyn LanguageModel>,
        market: Arc<dyn MarketData>,
    ) -> Self {
        Self {
            model: Some(model),
            market: Some(market),
            owns_backends: false,
            ..Self::new(config)
        }
    }

    /// Chain applied to every address argument (EVM addresses only move
    /// between EVM chains)
    pub fn with_default_chain(mut self, chain: Option<Chain>) -> Self {
        self.default_chain = chain;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Build the network clients, register tools and discover MCP tools.
    ///
    /// Calling it again on an initialized agent does nothing. A Cambrian MCP
    /// server that cannot be reached only disables the Cambrian tools.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            debug!("Agent already initialized");
            return Ok(());
        }

        let timeout = Duration::from_secs(self.config.agent.http_timeout_secs);
        let mut http: Option<Client> = None;

        if self.market.is_none() {
            let client = build_http_client(timeout)?;
            self.market = Some(Arc::new(ProviderSet::with_client(client.clone(), &self.config)));
            http = Some(client);
        }

        if self.model.is_none() {
            self.config.validate()?;
            let client = match &http {
                Some(client) => client.clone(),
                None => build_http_client(timeout)?,
            };
            let api_key = self.config.keys.google.clone().ok_or_else(|| {
                Error::Config("GOOGLE_API_KEY environment variable is not set".to_string())
            })?;
            let gemini = GeminiClient::new(
                client.clone(),
                &self.config.endpoints.gemini,
                api_key,
                self.config.model.clone(),
            )?;
            self.model = Some(Arc::new(gemini));
            http = Some(client);
        }

        let market = self.market.clone().ok_or(Error::NotInitialized)?;
        let mut registry = ToolRegistry::with_builtin(
            market,
            &self.config,
            InterceptorChain::from_config(&self.config),
        )?;

        if let Some(url) = self.config.endpoints.cambrian_mcp.clone() {
            let client = match http {
                Some(client) => client,
                None => build_http_client(timeout)?,
            };
            self.mcp = self.connect_mcp(client, &url, &mut registry).await;
        }

        info!(
            model = %self.model()?.model_name(),
            tools = registry.len(),
            mcp = self.mcp.is_some(),
            "Risk agent initialized"
        );
        self.registry = registry;
        self.initialized = true;
        Ok(())
    }

    async fn connect_mcp(
        &self,
        http: Client,
        url: &str,
        registry: &mut ToolRegistry,
    ) -> Option<Arc<McpClient>> {
        let client = match McpClient::connect(http, url, self.config.keys.cambrian.clone()).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!(error = %e, "Cambrian MCP unavailable, continuing without it");
                return None;
            }
        };

        match discover_mcp_tools(client.clone()).await {
            Ok(tools) => {
                for tool in tools {
                    let name = tool.name().to_string();
                    if let Err(e) = registry.register(tool) {
                        warn!(tool = %name, error = %e, "Skipping MCP tool");
                    }
                }
                Some(client)
            }
            Err(e) => {
                warn!(error = %e, "Cambrian MCP tool discovery failed");
                None
            }
        }
    }

    /// Drop the MCP session and the network clients
    pub async fn close(&mut self) {
        if !self.initialized {
            return;
        }
        let removed = self.registry.remove_prefixed(MCP_TOOL_PREFIX);
        self.mcp = None;
        self.registry = ToolRegistry::default();
        if self.owns_backends {
            self.model = None;
            self.market = None;
        }
        self.initialized = false;
        info!(mcp_tools = removed, "Risk agent closed");
    }

    /// Free-form question answered with tools
    pub async fn chat(&self, message: &str) -> Result<String> {
        let answer = self.converse("chat", message.to_string()).await?;
        Ok(answer.unwrap_or_else(|| iteration_limit_message(self.config.agent.max_iterations)))
    }

    /// Full rug-pull analysis.
    ///
    /// The score comes from the concurrently gathered signals; the model only
    /// writes the narrative, so a model failure still yields a report.
    pub async fn analyze(&self, address: &str) -> Result<RiskReport> {
        let token = self.parse_address(address)?;
        let market = self.market()?;
        info!(token = %token, chain = %token.chain(), "Analyzing token");

        let signals = Signals::gather(market.as_ref(), &token, &self.config.agent).await;
        let factors = signals.factors(&token, Utc::now());
        let assessment = assess(&factors, &self.config.risk);
        info!(
            token = %token,
            score = assessment.score,
            level = %assessment.level,
            "Deterministic assessment complete"
        );

        let overview = TokenOverview::from_pair(&token, signals.primary_pair());
        let metrics = KeyMetrics::from_signals(&signals);

        let narrative = match self
            .converse("analyze", analyze_prompt(&token, &assessment))
            .await
        {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(format!(
                "no answer within {} model round trips",
                self.config.agent.max_iterations
            )),
            Err(e) => {
                warn!(token = %token, error = %e, "Model narrative failed");
                Err(e.to_string())
            }
        };

        Ok(RiskReport::new(overview, assessment, metrics, narrative))
    }

    /// Market overview from DexScreener only, without the model
    pub async fn quick(&self, address: &str) -> Result<QuickReport> {
        let token = self.parse_address(address)?;
        let market = self.market()?;
        debug!(token = %token, "Quick lookup");

        let pairs = market.search_pairs(&token).await?;
        Ok(QuickReport {
            overview: TokenOverview::from_pair(&token, pairs.first()),
        })
    }

    /// Holder concentration analysis
    pub async fn holders(&self, address: &str) -> Result<String> {
        let token = self.parse_address(address)?;
        let answer = self.converse("holders", holders_prompt(&token)).await?;
        Ok(answer.unwrap_or_else(|| iteration_limit_message(self.config.agent.max_iterations)))
    }

    /// Currently trending tokens
    pub async fn trending(&self) -> Result<String> {
        let answer = self.converse("trending", trending_prompt()).await?;
        Ok(answer.unwrap_or_else(|| iteration_limit_message(self.config.agent.max_iterations)))
    }

    fn parse_address(&self, address: &str) -> Result<TokenAddress> {
        TokenAddress::parse_on(address.trim(), self.default_chain)
    }

    fn model(&self) -> Result<&Arc<dyn LanguageModel>> {
        self.model.as_ref().ok_or(Error::NotInitialized)
    }

    fn market(&self) -> Result<&Arc<dyn MarketData>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        self.market.as_ref().ok_or(Error::NotInitialized)
    }

    /// Run the function-calling loop; `None` when the iteration limit is hit
    async fn converse(&self, operation: &str, prompt: String) -> Result<Option<String>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let model = self.model()?;
        let tools = self.registry.declarations();
        let max_iterations = self.config.agent.max_iterations;
        let mut contents = vec![Content::user(prompt)];

        for iteration in 1..=max_iterations {
            let request = ModelRequest {
                system_instruction: system_prompt(self.default_chain),
                contents: contents.clone(),
                tools: tools.clone(),
            };
            let response = self
                .generate(model.as_ref(), operation, iteration, &request)
                .await?;

            let calls: Vec<FunctionCall> = response
                .content
                .function_calls()
                .into_iter()
                .cloned()
                .collect();

            if calls.is_empty() {
                let text = response.content.text();
                if text.trim().is_empty() {
                    return Err(LlmError::EmptyResponse.into());
                }
                debug!(operation, iteration, "Model answered");
                return Ok(Some(text));
            }

            info!(
                operation,
                iteration,
                tools = ?calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Model requested tool calls"
            );

            let results = futures::future::join_all(
                calls
                    .iter()
                    .map(|call| self.registry.invoke(&call.name, call.args.clone())),
            )
            .await;

            contents.push(response.content);
            contents.push(Content::function_responses(
                calls
                    .into_iter()
                    .zip(results)
                    .map(|(call, response)| FunctionResponse {
                        name: call.name,
                        response,
                    })
                    .collect(),
            ));
        }

        warn!(operation, max_iterations, "Iteration limit reached");
        Ok(None)
    }

    /// One model call wrapped by the LLM interceptors
    async fn generate(
        &self,
        model: &dyn LanguageModel,
        operation: &str,
        iteration: usize,
        request: &ModelRequest,
    ) -> std::result::Result<ModelResponse, LlmError> {
        let interceptors = self.registry.interceptors();
        let context = LlmCallContext {
            model: model.model_name().to_string(),
            operation: operation.to_string(),
            iteration,
            prompt: json!({
                "turns": request.contents.len(),
                "tools": request.tools.len(),
                "last": request.contents.last(),
            }),
        };

        if let InterceptorDecision::Block(reason) = interceptors.before_llm(&context).await {
            let error = LlmError::Intercepted(reason);
            interceptors.after_llm(&context, &Err(error.clone()), 0).await;
            return Err(error);
        }

        let start = Instant::now();
        let result = model.generate(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let summary = result
            .as_ref()
            .map(|response| {
                json!({
                    "finish_reason": response.finish_reason,
                    "usage": response.usage,
                    "function_calls": response.content.function_calls().len(),
                })
            })
            .map_err(Clone::clone);
        interceptors.after_llm(&context, &summary, duration_ms).await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::ScriptedModel;
    use crate::scoring::{DataQuality, RiskLevel};
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    async fn agent(model: Arc<ScriptedModel>, market: Arc<FixtureMarket>) -> RiskAgent {
        let mut agent = RiskAgent::with_backends(Config::default(), model, market);
        agent.initialize().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn operations_require_initialize() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = RiskAgent::with_backends(
            Config::default(),
            model.clone(),
            Arc::new(FixtureMarket::healthy()),
        );
        assert!(matches!(agent.chat("hi").await, Err(Error::NotInitialized)));
        assert!(matches!(
            agent.holders(addresses::BONK).await,
            Err(Error::NotInitialized)
        ));
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let mut agent = agent(model, Arc::new(FixtureMarket::healthy())).await;
        assert_eq!(agent.registry().len(), 12);
        agent.initialize().await.unwrap();
        assert_eq!(agent.registry().len(), 12);
        assert!(agent.is_initialized());
    }

    #[tokio::test]
    async fn chat_runs_requested_tools_and_returns_text() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::calls(vec![(
                "risk_score",
                json!({ "token_address": addresses::SOL }),
            )])),
            Ok(ModelResponse::text("SOL looks safe")),
        ]));
        let agent = agent(model.clone(), Arc::new(FixtureMarket::healthy())).await;

        let answer = agent.chat("Is SOL safe?").await.unwrap();
        assert_eq!(answer, "SOL looks safe");
        assert_eq!(model.request_count(), 2);

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].tools.len(), 12);
        let second = &requests[1].contents;
        assert_eq!(second.len(), 3);
        let response = second[2].parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.name, "risk_score");
        assert_eq!(response.response["status"], "success");
    }

    #[tokio::test]
    async fn parallel_calls_each_get_a_response() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::calls(vec![
                ("token_details", json!({ "token_address": addresses::SOL })),
                ("no_such_tool", json!({})),
            ])),
            Ok(ModelResponse::text("done")),
        ]));
        let agent = agent(model.clone(), Arc::new(FixtureMarket::healthy())).await;
        agent.chat("details").await.unwrap();

        let requests = model.requests.lock().unwrap();
        let parts = &requests[1].contents[2].parts;
        assert_eq!(parts.len(), 2);
        let unknown = parts[1].function_response.as_ref().unwrap();
        assert_eq!(unknown.response["status"], "error");
        assert_eq!(unknown.response["kind"], "unknown_tool");
    }

    #[tokio::test]
    async fn iteration_limit_returns_degraded_message() {
        let call = || {
            Ok(ModelResponse::calls(vec![(
                "trending_tokens",
                json!({}),
            )]))
        };
        let model = Arc::new(ScriptedModel::new(vec![call(), call(), call()]));
        let mut config = Config::default();
        config.agent.max_iterations = 2;
        let mut agent =
            RiskAgent::with_backends(config, model.clone(), Arc::new(FixtureMarket::healthy()));
        agent.initialize().await.unwrap();

        let answer = agent.trending().await.unwrap();
        assert_eq!(answer, iteration_limit_message(2));
        assert_eq!(model.request_count(), 2);
    }

    #[tokio::test]
    async fn analyze_keeps_assessment_when_model_fails() {
        let model = Arc::new(ScriptedModel::new(vec![Err(LlmError::RateLimited)]));
        let agent = agent(model, Arc::new(FixtureMarket::healthy())).await;

        let report = agent.analyze(addresses::SOL).await.unwrap();
        assert_eq!(report.assessment.score, 1);
        assert!(report.narrative.is_none());
        assert!(report
            .narrative_error
            .as_deref()
            .unwrap()
            .contains("rate limit"));
        assert!(!report.recommendation.is_empty());
    }

    #[tokio::test]
    async fn analyze_with_every_source_down_is_insufficient() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text(
            "No data available",
        ))]));
        let agent = agent(model, Arc::new(FixtureMarket::failing())).await;

        let report = agent.analyze(addresses::BONK).await.unwrap();
        assert_eq!(report.assessment.data_quality, DataQuality::Insufficient);
        assert_eq!(report.assessment.level, RiskLevel::High);
        assert_eq!(report.narrative.as_deref(), Some("No data available"));
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_any_call() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let market = Arc::new(FixtureMarket::healthy());
        let agent = agent(model.clone(), market.clone()).await;

        for bad in ["", "0x123", "not base58 0OIl", "0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"] {
            assert!(matches!(
                agent.analyze(bad).await,
                Err(Error::InvalidAddress(_))
            ));
            assert!(matches!(agent.quick(bad).await, Err(Error::InvalidAddress(_))));
        }
        assert_eq!(market.call_count(), 0);
        assert_eq!(model.request_count(), 0);
    }

    #[tokio::test]
    async fn quick_is_the_overview_of_analyze() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("ok"))]));
        let agent = agent(model.clone(), Arc::new(FixtureMarket::healthy())).await;

        let quick = agent.quick(addresses::SOL).await.unwrap();
        assert_eq!(model.request_count(), 0);
        let report = agent.analyze(addresses::SOL).await.unwrap();
        assert_eq!(report.quick(), quick);
    }

    #[tokio::test]
    async fn close_releases_the_session() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let mut agent = agent(model, Arc::new(FixtureMarket::healthy())).await;
        agent.close().await;
        assert!(!agent.is_initialized());
        assert!(agent.registry().is_empty());
        assert!(matches!(agent.trending().await, Err(Error::NotInitialized)));
    }

    #[tokio::test]
    async fn default_chain_retargets_evm_addresses() {
        let model = Arc::new(ScriptedModel::new(vec![]));
        let agent = agent(model, Arc::new(FixtureMarket::healthy()))
            .await
            .with_default_chain(Some(Chain::Base));

        let quick = agent.quick(addresses::USDC_ETH).await.unwrap();
        assert_eq!(quick.overview.chain, Chain::Base);
        assert!(matches!(
            agent.quick(addresses::BONK).await,
            Err(Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn chat_tells_the_model_the_default_chain() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("ok"))]));
        let agent = agent(model.clone(), Arc::new(FixtureMarket::healthy()))
            .await
            .with_default_chain(Some(Chain::Base));

        agent.chat("is this token safe?").await.unwrap();
        let requests = model.requests.lock().unwrap();
        assert!(requests[0].system_instruction.contains(r#""chain": "base""#));
    }
}
