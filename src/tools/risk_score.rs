//! Deterministic risk score over every data source

use super::types::TokenInput;
use super::{RiskTool, ToolError, TOOL_RISK_SCORE};
use crate::config::{AgentSettings, RiskThresholds};
use crate::scoring::assess;
use crate::signals::Signals;
use crate::sources::MarketData;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Gathers every signal concurrently and applies the scoring matrix
pub struct RiskScoreTool {
    market: Arc<dyn MarketData>,
    settings: AgentSettings,
    thresholds: RiskThresholds,
}

impl RiskScoreTool {
    pub fn new(
        market: Arc<dyn MarketData>,
        settings: AgentSettings,
        thresholds: RiskThresholds,
    ) -> Self {
        Self {
            market,
            settings,
            thresholds,
        }
    }
}

#[async_trait]
impl RiskTool for RiskScoreTool {
    const NAME: &'static str = TOOL_RISK_SCORE;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Computes the weighted 1-10 rug-pull risk score for a token from authority status, \
         audit, liquidity, holder concentration and pair age, with hard overrides for an \
         active mint authority, liquidity under $1,000 and known security incidents. \
         Returns sub-scores, red flags and which data sources were unavailable."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let signals = Signals::gather(self.market.as_ref(), &token, &self.settings).await;
        let factors = signals.factors(&token, Utc::now());
        let assessment = assess(&factors, &self.thresholds);

        Ok(json!({
            "status": "success",
            "token": token.as_str(),
            "chain": token.chain(),
            "assessment": assessment,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    fn tool(market: FixtureMarket) -> RiskScoreTool {
        RiskScoreTool::new(
            Arc::new(market),
            AgentSettings::default(),
            RiskThresholds::default(),
        )
    }

    fn input() -> TokenInput {
        TokenInput {
            token_address: addresses::SOL.to_string(),
            chain: None,
        }
    }

    #[tokio::test]
    async fn healthy_token_scores_low() {
        let value = tool(FixtureMarket::healthy()).execute(input()).await.unwrap();
        let assessment = &value["assessment"];
        assert_eq!(assessment["score"], 1);
        assert_eq!(assessment["level"], "LOW");
        assert_eq!(assessment["data_quality"], "complete");
    }

    #[tokio::test]
    async fn all_sources_failing_is_still_a_result() {
        let value = tool(FixtureMarket::failing()).execute(input()).await.unwrap();
        let assessment = &value["assessment"];
        assert_eq!(assessment["score"], 7);
        assert_eq!(assessment["data_quality"], "insufficient");
        assert_eq!(assessment["failed_sources"].as_array().unwrap().len(), 7);
    }
}
