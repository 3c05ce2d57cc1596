//! DexScreener market tools

use super::types::{ChainInput, TokenInput};
use super::{
    RiskTool, ToolError, TOOL_LIQUIDITY_SNAPSHOT, TOOL_TOKEN_DETAILS, TOOL_TRADING_METRICS,
    TOOL_TRENDING_TOKENS,
};
use crate::report::TokenOverview;
use crate::sources::{MarketData, Pair};
use crate::token::{Chain, TokenAddress};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

async fn primary_pair(
    market: &dyn MarketData,
    token: &TokenAddress,
) -> Result<(Pair, usize), ToolError> {
    let pairs = market.search_pairs(token).await?;
    let count = pairs.len();
    pairs
        .into_iter()
        .next()
        .map(|pair| (pair, count))
        .ok_or_else(|| ToolError::Execution(format!("no trading pairs for {}", token)))
}

/// Liquidity of the deepest pool
pub struct LiquiditySnapshotTool {
    market: Arc<dyn MarketData>,
}

impl LiquiditySnapshotTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for LiquiditySnapshotTool {
    const NAME: &'static str = TOOL_LIQUIDITY_SNAPSHOT;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Returns the liquidity of a token's most liquid DexScreener pair in USD and in \
         base/quote units, the DEX it trades on, and how many pairs exist. \
         Liquidity under $1,000 is a critical rug-pull signal."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let (pair, pair_count) = primary_pair(self.market.as_ref(), &token).await?;
        let liquidity = pair.liquidity.unwrap_or_default();

        Ok(json!({
            "status": "success",
            "source": "DexScreener",
            "token": token.as_str(),
            "dex": pair.dex_id,
            "pair_address": pair.pair_address,
            "pair_count": pair_count,
            "liquidity_usd": liquidity.usd,
            "liquidity_base": liquidity.base,
            "liquidity_quote": liquidity.quote,
            "quote_symbol": pair.quote_token.symbol,
        }))
    }
}

/// Volume, price change and buy/sell counts
pub struct TradingMetricsTool {
    market: Arc<dyn MarketData>,
}

impl TradingMetricsTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for TradingMetricsTool {
    const NAME: &'static str = TOOL_TRADING_METRICS;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Returns trading activity for a token's main pair: volume and price change over \
         5 minutes, 1 hour, 6 hours and 24 hours, plus buy and sell counts."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let (pair, _) = primary_pair(self.market.as_ref(), &token).await?;
        let txns = pair.txns;

        let buys = txns.h24.buys;
        let sells = txns.h24.sells;
        let buy_sell_ratio = (sells > 0).then(|| buys as f64 / sells as f64);

        Ok(json!({
            "status": "success",
            "source": "DexScreener",
            "token": token.as_str(),
            "price_usd": pair.price_usd,
            "volume": pair.volume,
            "price_change_pct": pair.price_change,
            "txns": {
                "m5": txns.m5,
                "h1": txns.h1,
                "h24": txns.h24,
            },
            "buy_sell_ratio_24h": buy_sell_ratio,
        }))
    }
}

/// Market overview of a token
pub struct TokenDetailsTool {
    market: Arc<dyn MarketData>,
}

impl TokenDetailsTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for TokenDetailsTool {
    const NAME: &'static str = TOOL_TOKEN_DETAILS;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Gives a quick market overview of a token from DexScreener: name, symbol, price, \
         liquidity, 24h volume and price change, market cap and pair age."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let (pair, _) = primary_pair(self.market.as_ref(), &token).await?;
        let overview = TokenOverview::from_pair(&token, Some(&pair));

        let mut value = serde_json::to_value(&overview)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.insert("status".to_string(), json!("success"));
            map.insert("source".to_string(), json!("DexScreener"));
        }
        Ok(value)
    }
}

/// Pairs currently listed for a chain
pub struct TrendingTokensTool {
    market: Arc<dyn MarketData>,
}

impl TrendingTokensTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for TrendingTokensTool {
    const NAME: &'static str = TOOL_TRENDING_TOKENS;
    type Input = ChainInput;

    fn description(&self) -> &'static str {
        "Lists currently trending token pairs on a chain (Solana by default) from \
         DexScreener with price, liquidity, 24h volume and price change."
    }

    async fn execute(&self, input: ChainInput) -> Result<Value, ToolError> {
        let chain = input.chain.unwrap_or(Chain::Solana);
        let pairs = self.market.trending(chain).await?;

        let tokens: Vec<Value> = pairs
            .iter()
            .map(|pair| {
                json!({
                    "symbol": pair.base_token.symbol,
                    "name": pair.base_token.name,
                    "address": pair.base_token.address,
                    "price_usd": pair.price_usd,
                    "liquidity_usd": pair.liquidity_usd(),
                    "volume_24h": pair.volume.h24,
                    "price_change_24h": pair.price_change.h24,
                    "url": pair.url,
                })
            })
            .collect();

        Ok(json!({
            "status": "success",
            "source": "DexScreener",
            "chain": chain,
            "count": tokens.len(),
            "tokens": tokens,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::dexscreener::tests::sample_pair;
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    fn input(address: &str) -> TokenInput {
        TokenInput {
            token_address: address.to_string(),
            chain: None,
        }
    }

    #[tokio::test]
    async fn liquidity_snapshot_uses_deepest_pair() {
        let market = FixtureMarket {
            pairs: Some(vec![sample_pair(250_000.0, 10), sample_pair(1_000.0, 10)]),
            ..FixtureMarket::default()
        };
        let tool = LiquiditySnapshotTool::new(Arc::new(market));
        let value = tool.execute(input(addresses::SOL)).await.unwrap();
        assert_eq!(value["liquidity_usd"], 250_000.0);
        assert_eq!(value["pair_count"], 2);
        assert_eq!(value["dex"], "raydium");
    }

    #[tokio::test]
    async fn empty_pair_list_is_an_execution_error() {
        let market = FixtureMarket {
            pairs: Some(Vec::new()),
            ..FixtureMarket::default()
        };
        let tool = TradingMetricsTool::new(Arc::new(market));
        let err = tool.execute(input(addresses::BONK)).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution(_)));
    }

    #[tokio::test]
    async fn trading_metrics_without_sells_has_no_ratio() {
        let tool = TradingMetricsTool::new(Arc::new(FixtureMarket::healthy()));
        let value = tool.execute(input(addresses::SOL)).await.unwrap();
        assert_eq!(value["txns"]["m5"]["buys"], 12);
        assert!(value["buy_sell_ratio_24h"].is_null());
    }

    #[tokio::test]
    async fn token_details_carries_overview_fields() {
        let tool = TokenDetailsTool::new(Arc::new(FixtureMarket::healthy()));
        let value = tool.execute(input(addresses::SOL)).await.unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["symbol"], "SOL");
        assert_eq!(value["price_usd"], 142.51);
    }

    #[tokio::test]
    async fn trending_defaults_to_solana() {
        let tool = TrendingTokensTool::new(Arc::new(FixtureMarket::healthy()));
        let value = tool.execute(ChainInput::default()).await.unwrap();
        assert_eq!(value["chain"], "solana");
        assert_eq!(value["count"], 1);
        assert_eq!(value["tokens"][0]["symbol"], "SOL");
    }
}
