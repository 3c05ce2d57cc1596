//! DexScreener client
//!
//! Pair search and trending pairs. DexScreener needs no API key.

use super::{endpoint, fetch_json, SourceError};
use crate::token::{Chain, TokenAddress};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

const PROVIDER: &str = "dexscreener";

/// Trending lists are capped at this many pairs
pub const TRENDING_LIMIT: usize = 10;

/// One side of a trading pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairToken {
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
}

/// Values reported per time window
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Windowed {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
    pub base: Option<f64>,
    pub quote: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BuySell {
    #[serde(default, deserialize_with = "null_as_default")]
    pub buys: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sells: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Txns {
    #[serde(default, deserialize_with = "null_as_default")]
    pub m5: BuySell,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h1: BuySell,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h24: BuySell,
}

/// A DexScreener trading pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    #[serde(default)]
    pub pair_address: String,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_token: PairToken,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quote_token: PairToken,
    /// DexScreener sends prices as strings
    #[serde(default, deserialize_with = "number_or_string")]
    pub price_usd: Option<f64>,
    pub liquidity: Option<Liquidity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume: Windowed,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_change: Windowed,
    #[serde(default, deserialize_with = "null_as_default")]
    pub txns: Txns,
    pub fdv: Option<f64>,
    pub market_cap: Option<f64>,
    /// Pair creation time in unix milliseconds
    pub pair_created_at: Option<i64>,
}

impl Pair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.and_then(|l| l.usd)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.pair_created_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    /// Pair age in hours relative to `now`
    pub fn age_hours(&self, now: DateTime<Utc>) -> Option<f64> {
        self.created_at()
            .map(|created| (now - created).num_seconds().max(0) as f64 / 3600.0)
    }

    fn matches(&self, token: &TokenAddress) -> bool {
        if token.chain().is_evm() {
            self.base_token.address.eq_ignore_ascii_case(token.as_str())
        } else {
            self.base_token.address == token.as_str()
        }
    }
}

#[derive(Debug, Deserialize)]
struct PairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Explicit `null` decodes like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Order pairs so the most liquid comes first
fn by_liquidity_desc(pairs: &mut [Pair]) {
    pairs.sort_by(|a, b| {
        let a = a.liquidity_usd().unwrap_or(0.0);
        let b = b.liquidity_usd().unwrap_or(0.0);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// DexScreener REST client
#[derive(Clone)]
pub struct DexScreenerClient {
    http: Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Search pairs for a token address.
    ///
    /// Pairs whose base token is the queried address are preferred; results
    /// are ordered by USD liquidity, most liquid first.
    pub async fn search_pairs(&self, token: &TokenAddress) -> Result<Vec<Pair>, SourceError> {
        let url = endpoint(PROVIDER, &self.base_url, "latest/dex/search")?;
        let response: PairsResponse = fetch_json(
            PROVIDER,
            self.http.get(url).query(&[("q", token.as_str())]),
        )
        .await?;

        let pairs = response.pairs.unwrap_or_default();
        let (mut matching, mut others): (Vec<_>, Vec<_>) =
            pairs.into_iter().partition(|p| p.matches(token));

        let mut selected = if matching.is_empty() {
            std::mem::take(&mut others)
        } else {
            std::mem::take(&mut matching)
        };

        if selected.is_empty() {
            return Err(SourceError::not_found(
                PROVIDER,
                format!("no trading pairs found for {}", token),
            ));
        }

        by_liquidity_desc(&mut selected);
        tracing::debug!(token = %token, pairs = selected.len(), "DexScreener search");
        Ok(selected)
    }

    /// Trending pairs for a chain, capped at [`TRENDING_LIMIT`]
    pub async fn trending(&self, chain: Chain) -> Result<Vec<Pair>, SourceError> {
        let path = format!("latest/dex/tokens/{}", chain.slug());
        let url = endpoint(PROVIDER, &self.base_url, &path)?;
        let response: PairsResponse = fetch_json(PROVIDER, self.http.get(url)).await?;

        let mut pairs = response.pairs.unwrap_or_default();
        pairs.truncate(TRENDING_LIMIT);
        Ok(pairs)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::token::addresses;
    use serde_json::json;

    /// A pair for the SOL mint with the given liquidity and age
    pub(crate) fn sample_pair(liquidity_usd: f64, age_days: i64) -> Pair {
        let created = Utc::now() - chrono::Duration::days(age_days);
        serde_json::from_value(json!({
            "chainId": "solana",
            "dexId": "raydium",
            "pairAddress": "pair1",
            "baseToken": { "address": addresses::SOL, "name": "Wrapped SOL", "symbol": "SOL" },
            "quoteToken": { "address": addresses::USDC_SOL, "name": "USD Coin", "symbol": "USDC" },
            "priceUsd": "142.51",
            "liquidity": { "usd": liquidity_usd },
            "volume": { "m5": 1000.0, "h1": 20000.0, "h24": 5000000.0 },
            "priceChange": { "m5": 0.1, "h1": -0.4, "h24": 2.5 },
            "txns": { "m5": { "buys": 12, "sells": 9 } },
            "fdv": 70000000000.0,
            "marketCap": 68000000000.0,
            "pairCreatedAt": created.timestamp_millis()
        }))
        .expect("sample pair")
    }

    #[test]
    fn pair_decodes_string_prices_and_missing_fields() {
        let pair: Pair = serde_json::from_value(json!({
            "baseToken": { "address": "x", "symbol": "X" },
            "priceUsd": "0.0042",
            "liquidity": null,
            "pairCreatedAt": 1_700_000_000_000i64
        }))
        .unwrap();
        assert_eq!(pair.price_usd, Some(0.0042));
        assert!(pair.liquidity_usd().is_none());
        assert_eq!(pair.txns.m5.buys, 0);
        assert!(pair.created_at().is_some());
    }

    #[test]
    fn explicit_nulls_decode_as_empty_windows() {
        let body = json!({
            "pairs": [{
                "baseToken": { "address": addresses::SOL, "name": null, "symbol": "SOL" },
                "quoteToken": null,
                "priceUsd": null,
                "volume": null,
                "priceChange": { "h24": null },
                "txns": { "m5": null, "h24": { "buys": null, "sells": 4 } }
            }]
        });
        let response: PairsResponse = serde_json::from_value(body).unwrap();
        let pair = &response.pairs.unwrap()[0];

        assert_eq!(pair.base_token.symbol, "SOL");
        assert_eq!(pair.base_token.name, "");
        assert_eq!(pair.quote_token.address, "");
        assert!(pair.price_usd.is_none());
        assert!(pair.volume.h24.is_none());
        assert!(pair.price_change.h24.is_none());
        assert_eq!(pair.txns.m5.buys, 0);
        assert_eq!(pair.txns.h24.buys, 0);
        assert_eq!(pair.txns.h24.sells, 4);
    }

    #[test]
    fn age_is_measured_from_creation() {
        let pair = sample_pair(1.0, 2);
        let hours = pair.age_hours(Utc::now()).unwrap();
        assert!((47.9..48.1).contains(&hours));
    }

    #[test]
    fn liquidity_ordering_puts_deepest_pool_first() {
        let mut pairs = vec![
            sample_pair(10.0, 1),
            sample_pair(1_000.0, 1),
            sample_pair(100.0, 1),
        ];
        by_liquidity_desc(&mut pairs);
        let ordered: Vec<_> = pairs.iter().filter_map(|p| p.liquidity_usd()).collect();
        assert_eq!(ordered, vec![1_000.0, 100.0, 10.0]);
    }

    #[test]
    fn base_token_match_respects_chain_family() {
        let pair = sample_pair(1.0, 1);
        let sol = TokenAddress::parse(addresses::SOL).unwrap();
        let usdc = TokenAddress::parse(addresses::USDC_SOL).unwrap();
        assert!(pair.matches(&sol));
        assert!(!pair.matches(&usdc));
    }
}
