//! Helius client
//!
//! Holder distribution and recent transaction history for Solana mints.

use super::{endpoint, fetch_json, SourceError};
use crate::token::TokenAddress;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROVIDER: &str = "helius";

/// Transfers above this amount count as large
pub const LARGE_TRANSFER_AMOUNT: f64 = 1_000_000.0;
/// More large transfers than this flags the pattern as high risk
pub const LARGE_TRANSFER_ALERT_COUNT: usize = 3;
/// Number of most recent transactions inspected for patterns
const INSPECTED_TRANSACTIONS: usize = 5;
/// Transaction types Helius labels as abusive
const SUSPICIOUS_TYPES: [&str; 2] = ["SPAM", "SCAM"];

/// Concentration band of the top-10 holders
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConcentrationRisk {
    Low,
    Medium,
    High,
    Critical,
}

impl ConcentrationRisk {
    /// >70% critical, >50% high, >30% medium
    pub fn classify(top10_pct: f64) -> Self {
        if top10_pct > 70.0 {
            Self::Critical
        } else if top10_pct > 50.0 {
            Self::High
        } else if top10_pct > 30.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holder {
    pub owner: String,
    pub amount: f64,
}

impl Holder {
    pub fn new(owner: impl Into<String>, amount: f64) -> Self {
        Self {
            owner: owner.into(),
            amount,
        }
    }
}

/// Holder list with concentration metrics over the returned holders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderDistribution {
    pub total_holders: usize,
    /// Share of the returned amount held by the ten largest holders
    pub top10_pct: f64,
    pub top_holder: Option<Holder>,
    pub top_holder_pct: Option<f64>,
    pub concentration_risk: ConcentrationRisk,
    pub holders: Vec<Holder>,
}

impl HolderDistribution {
    pub fn from_holders(mut holders: Vec<Holder>) -> Self {
        holders.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total: f64 = holders.iter().map(|h| h.amount).sum();
        let top10: f64 = holders.iter().take(10).map(|h| h.amount).sum();
        let pct = |amount: f64| if total > 0.0 { amount / total * 100.0 } else { 0.0 };

        let top10_pct = pct(top10);
        let top_holder = holders.first().cloned();
        let top_holder_pct = top_holder.as_ref().map(|h| pct(h.amount));

        Self {
            total_holders: holders.len(),
            top10_pct,
            top_holder,
            top_holder_pct,
            concentration_risk: ConcentrationRisk::classify(top10_pct),
            holders,
        }
    }
}

/// Risk read of recent transaction patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PatternRisk {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub recent_tx_count: usize,
    pub large_transactions: usize,
    pub suspicious_patterns: Vec<String>,
    pub risk_level: PatternRisk,
}

impl TransactionSummary {
    /// Inspect the most recent transactions for large transfers and abusive types
    pub fn from_transactions(transactions: &[Value]) -> Self {
        let mut large_transactions = 0;
        let mut suspicious_patterns = Vec::new();

        for tx in transactions.iter().take(INSPECTED_TRANSACTIONS) {
            let amount = tx.get("amount").and_then(number).unwrap_or(0.0);
            if amount > LARGE_TRANSFER_AMOUNT {
                large_transactions += 1;
            }

            if let Some(kind) = tx.get("type").and_then(|v| v.as_str()) {
                if SUSPICIOUS_TYPES.contains(&kind) {
                    suspicious_patterns.push(format!("Suspicious tx type: {}", kind));
                }
            }
        }

        let risk_level =
            if large_transactions > LARGE_TRANSFER_ALERT_COUNT || !suspicious_patterns.is_empty() {
                PatternRisk::High
            } else {
                PatternRisk::Low
            };

        Self {
            recent_tx_count: transactions.len(),
            large_transactions,
            suspicious_patterns,
            risk_level,
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct HoldersResponse {
    #[serde(default)]
    holders: Vec<RawHolder>,
}

#[derive(Debug, Deserialize)]
struct RawHolder {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    amount: Value,
}

/// Helius REST client
#[derive(Clone)]
pub struct HeliusClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HeliusClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key,
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("api-key", key.expose_secret())]),
            None => request,
        }
    }

    /// Largest holders of a mint with concentration metrics
    pub async fn holders(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<HolderDistribution, SourceError> {
        if token.chain().is_evm() {
            return Err(SourceError::Unsupported {
                provider: PROVIDER,
                chain: token.chain(),
            });
        }

        let url = endpoint(PROVIDER, &self.base_url, "v0/token-metadata/holders")?;
        let request = self
            .http
            .get(url)
            .query(&[("mint", token.as_str())])
            .query(&[("limit", limit)]);
        let response: HoldersResponse = fetch_json(PROVIDER, self.authorize(request)).await?;

        let holders: Vec<Holder> = response
            .holders
            .into_iter()
            .filter_map(|h| {
                let owner = h.owner.or(h.address)?;
                Some(Holder::new(owner, number(&h.amount).unwrap_or(0.0)))
            })
            .collect();

        if holders.is_empty() {
            return Err(SourceError::not_found(PROVIDER, "no holder data available"));
        }

        Ok(HolderDistribution::from_holders(holders))
    }

    /// Recent transactions touching a mint, summarized for risk patterns
    pub async fn transactions(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<TransactionSummary, SourceError> {
        if token.chain().is_evm() {
            return Err(SourceError::Unsupported {
                provider: PROVIDER,
                chain: token.chain(),
            });
        }

        let path = format!("v0/addresses/{}/transactions", token.as_str());
        let url = endpoint(PROVIDER, &self.base_url, &path)?;
        let request = self.http.get(url).query(&[("limit", limit)]);
        let body: Value = fetch_json(PROVIDER, self.authorize(request)).await?;

        // The enhanced API returns a bare array; older shapes wrap it
        let transactions = match &body {
            Value::Array(items) => items.as_slice(),
            other => other
                .get("transactions")
                .and_then(|v| v.as_array())
                .map(|v| v.as_slice())
                .ok_or_else(|| SourceError::malformed(PROVIDER, "missing transactions"))?,
        };

        Ok(TransactionSummary::from_transactions(transactions))
    }
}
