//! Token metadata from Solscan with a Jupiter fallback

use super::{endpoint, fetch_json, SourceError};
use crate::token::TokenAddress;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SOLSCAN: &str = "solscan";
const JUPITER: &str = "jupiter";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub logo: Option<String>,
    pub total_supply: Option<f64>,
    pub holders: Option<u64>,
    /// Provider that answered
    pub source: String,
}

impl TokenMetadata {
    fn from_solscan(data: &Value) -> Self {
        Self {
            name: str_field(data, "name").unwrap_or_else(|| "Unknown".to_string()),
            symbol: str_field(data, "symbol").unwrap_or_else(|| "?".to_string()),
            decimals: u8_field(data, "decimals"),
            logo: str_field(data, "icon"),
            total_supply: data.get("supply").and_then(number),
            holders: data.get("holder").and_then(|v| v.as_u64()),
            source: "Solscan".to_string(),
        }
    }

    fn from_jupiter(data: &Value) -> Self {
        Self {
            name: str_field(data, "name").unwrap_or_else(|| "Unknown".to_string()),
            symbol: str_field(data, "symbol").unwrap_or_else(|| "?".to_string()),
            decimals: u8_field(data, "decimals"),
            logo: str_field(data, "logoURI"),
            total_supply: None,
            holders: None,
            source: "Jupiter".to_string(),
        }
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn u8_field(data: &Value, key: &str) -> u8 {
    data.get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(0)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone)]
pub struct MetadataClient {
    http: Client,
    solscan_url: String,
    jupiter_url: String,
}

impl MetadataClient {
    pub fn new(http: Client, solscan_url: &str, jupiter_url: &str) -> Self {
        Self {
            http,
            solscan_url: solscan_url.to_string(),
            jupiter_url: jupiter_url.to_string(),
        }
    }

    /// Metadata from Solscan; Jupiter answers when Solscan errors
    pub async fn metadata(&self, token: &TokenAddress) -> Result<TokenMetadata, SourceError> {
        if token.chain().is_evm() {
            return Err(SourceError::Unsupported {
                provider: SOLSCAN,
                chain: token.chain(),
            });
        }

        match self.solscan(token).await {
            Ok(Some(meta)) => return Ok(meta),
            Ok(None) => {
                return Err(SourceError::not_found(SOLSCAN, "token not found on Solscan"));
            }
            Err(e) => {
                tracing::debug!(error = %e, "Solscan unavailable, falling back to Jupiter");
            }
        }

        self.jupiter(token).await
    }

    async fn solscan(&self, token: &TokenAddress) -> Result<Option<TokenMetadata>, SourceError> {
        let url = endpoint(SOLSCAN, &self.solscan_url, "token/meta")?;
        let body: Value = fetch_json(
            SOLSCAN,
            self.http.get(url).query(&[("tokenAddress", token.as_str())]),
        )
        .await?;

        if body.get("success").and_then(|v| v.as_bool()) != Some(true) {
            return Ok(None);
        }
        Ok(body.get("data").map(TokenMetadata::from_solscan))
    }

    async fn jupiter(&self, token: &TokenAddress) -> Result<TokenMetadata, SourceError> {
        let path = format!("token/{}", token.as_str());
        let url = endpoint(JUPITER, &self.jupiter_url, &path)?;
        let body: Value = fetch_json(JUPITER, self.http.get(url)).await?;
        Ok(TokenMetadata::from_jupiter(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn solscan_fields() {
        let meta = TokenMetadata::from_solscan(&json!({
            "name": "Bonk",
            "symbol": "Bonk",
            "decimals": 5,
            "icon": "https://x/icon.png",
            "supply": "88888888888888",
            "holder": 812345
        }));
        assert_eq!(meta.decimals, 5);
        assert_eq!(meta.holders, Some(812345));
        assert_eq!(meta.total_supply, Some(88888888888888.0));
        assert_eq!(meta.source, "Solscan");
    }

    #[test]
    fn jupiter_defaults_for_missing_fields() {
        let meta = TokenMetadata::from_jupiter(&json!({ "decimals": 300 }));
        assert_eq!(meta.name, "Unknown");
        assert_eq!(meta.symbol, "?");
        assert_eq!(meta.decimals, 0);
        assert_eq!(meta.source, "Jupiter");
    }
}
