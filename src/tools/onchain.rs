//! On-chain data tools backed by Helius and the metadata providers

use super::types::{LimitedTokenInput, TokenInput};
use super::{
    RiskTool, ToolError, TOOL_HOLDER_DISTRIBUTION, TOOL_TOKEN_METADATA, TOOL_TRANSACTION_HISTORY,
};
use crate::sources::MarketData;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Holders shown to the model; the rest only feed the percentages
const LISTED_HOLDERS: usize = 10;

/// Top holders and concentration risk
pub struct HolderDistributionTool {
    market: Arc<dyn MarketData>,
    max_holders: u32,
}

impl HolderDistributionTool {
    pub fn new(market: Arc<dyn MarketData>, max_holders: u32) -> Self {
        Self {
            market,
            max_holders,
        }
    }
}

#[async_trait]
impl RiskTool for HolderDistributionTool {
    const NAME: &'static str = TOOL_HOLDER_DISTRIBUTION;
    type Input = LimitedTokenInput;

    fn description(&self) -> &'static str {
        "Analyzes the holder distribution of a Solana token via Helius: total holders \
         returned, share held by the top 10 wallets, the largest holder, and a \
         concentration risk level (CRITICAL above 70%, HIGH above 50%, MEDIUM above 30%)."
    }

    async fn execute(&self, input: LimitedTokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let limit = input.limit_or(self.max_holders);
        let distribution = self.market.holders(&token, limit).await?;

        let top_holders: Vec<Value> = distribution
            .holders
            .iter()
            .take(LISTED_HOLDERS)
            .map(|h| json!({ "owner": h.owner, "amount": h.amount }))
            .collect();

        Ok(json!({
            "status": "success",
            "source": "Helius",
            "token": token.as_str(),
            "total_holders": distribution.total_holders,
            "top10_concentration_pct": round2(distribution.top10_pct),
            "top_holder": distribution.top_holder.as_ref().map(|h| json!({
                "owner": h.owner,
                "amount": h.amount,
                "pct": distribution.top_holder_pct.map(round2),
            })),
            "concentration_risk": distribution.concentration_risk,
            "top_holders": top_holders,
        }))
    }
}

/// Recent transactions and suspicious patterns
pub struct TransactionHistoryTool {
    market: Arc<dyn MarketData>,
    max_transactions: u32,
}

impl TransactionHistoryTool {
    pub fn new(market: Arc<dyn MarketData>, max_transactions: u32) -> Self {
        Self {
            market,
            max_transactions,
        }
    }
}

#[async_trait]
impl RiskTool for TransactionHistoryTool {
    const NAME: &'static str = TOOL_TRANSACTION_HISTORY;
    type Input = LimitedTokenInput;

    fn description(&self) -> &'static str {
        "Reviews recent transactions of a Solana token via Helius, counting large transfers \
         and transaction types flagged as spam or scam."
    }

    async fn execute(&self, input: LimitedTokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let limit = input.limit_or(self.max_transactions);
        let summary = self.market.transactions(&token, limit).await?;

        Ok(json!({
            "status": "success",
            "source": "Helius",
            "token": token.as_str(),
            "recent_tx_count": summary.recent_tx_count,
            "large_transactions": summary.large_transactions,
            "suspicious_patterns": summary.suspicious_patterns,
            "risk_level": summary.risk_level,
        }))
    }
}

/// Name, symbol, decimals and supply
pub struct TokenMetadataTool {
    market: Arc<dyn MarketData>,
}

impl TokenMetadataTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for TokenMetadataTool {
    const NAME: &'static str = TOOL_TOKEN_METADATA;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Fetches token metadata (name, symbol, decimals, supply, holder count) from Solscan, \
         falling back to the Jupiter token list."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let metadata = self.market.metadata(&token).await?;
        let known = token.known();

        Ok(json!({
            "status": "success",
            "source": metadata.source,
            "token": token.as_str(),
            "name": metadata.name,
            "symbol": metadata.symbol,
            "decimals": metadata.decimals,
            "total_supply": metadata.total_supply,
            "holders": metadata.holders,
            "logo": metadata.logo,
            "established": known.map(|k| k.is_established).unwrap_or(false),
            "stablecoin": known.map(|k| k.is_stablecoin).unwrap_or(false),
        }))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
