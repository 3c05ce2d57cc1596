//! GoPlus Security client
//!
//! Mint/freeze authority and related contract flags. Solana tokens use the
//! dedicated Solana endpoint; EVM tokens use the chain-id endpoint.

use super::{endpoint, fetch_json, SourceError};
use crate::token::TokenAddress;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PROVIDER: &str = "goplus";

/// Whether a privileged authority is still held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityStatus {
    Renounced,
    Active,
    #[default]
    Unknown,
}

impl AuthorityStatus {
    fn from_renounced(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::Renounced,
            Some(false) => Self::Active,
            None => Self::Unknown,
        }
    }

    fn from_held(flag: Option<bool>) -> Self {
        Self::from_renounced(flag.map(|held| !held))
    }
}

/// Security flags for a token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenSecurity {
    pub mint_authority: AuthorityStatus,
    pub freeze_authority: AuthorityStatus,
    pub liquidity_type: Option<String>,
    pub owner_balance_holder_ratio: Option<f64>,
    pub is_honeypot: Option<bool>,
    /// Provider entry as returned, for the model to inspect
    #[serde(default)]
    pub raw: Value,
}

impl TokenSecurity {
    fn from_entry(entry: &Map<String, Value>) -> Self {
        let mint_authority = match entry.get("is_mint_authority_renounced") {
            Some(v) => AuthorityStatus::from_renounced(flag(v)),
            None => AuthorityStatus::from_held(
                entry
                    .get("mintable")
                    .or_else(|| entry.get("is_mintable"))
                    .and_then(flag),
            ),
        };

        let freeze_authority = match entry.get("is_freeze_authority_renounced") {
            Some(v) => AuthorityStatus::from_renounced(flag(v)),
            None => AuthorityStatus::from_held(
                entry
                    .get("freezable")
                    .or_else(|| entry.get("transfer_pausable"))
                    .and_then(flag),
            ),
        };

        Self {
            mint_authority,
            freeze_authority,
            liquidity_type: entry
                .get("liquidity_type")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            owner_balance_holder_ratio: entry
                .get("owner_balance_holder_ratio")
                .or_else(|| entry.get("owner_percent"))
                .and_then(number),
            is_honeypot: entry.get("is_honeypot").and_then(flag),
            raw: Value::Object(entry.clone()),
        }
    }
}

/// GoPlus reports booleans as `"0"`/`"1"`, bools, numbers or `{"status": …}`
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        Value::Object(map) => map.get("status").and_then(flag),
        _ => None,
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
struct SecurityResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Map<String, Value>>,
}

/// GoPlus REST client
#[derive(Clone)]
pub struct GoPlusClient {
    http: Client,
    base_url: String,
}

impl GoPlusClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Fetch security flags for a token
    pub async fn token_security(&self, token: &TokenAddress) -> Result<TokenSecurity, SourceError> {
        let path = if token.chain().is_evm() {
            format!("api/v1/token_security/{}", token.chain().goplus_id())
        } else {
            "api/v1/solana/token_security".to_string()
        };
        let url = endpoint(PROVIDER, &self.base_url, &path)?;

        let response: SecurityResponse = fetch_json(
            PROVIDER,
            self.http
                .get(url)
                .query(&[("contract_addresses", token.as_str())]),
        )
        .await?;

        parse_response(response, token)
    }
}

fn parse_response(
    response: SecurityResponse,
    token: &TokenAddress,
) -> Result<TokenSecurity, SourceError> {
    if let Some(code) = response.code {
        if code != 1 {
            return Err(SourceError::malformed(
                PROVIDER,
                format!(
                    "code {}: {}",
                    code,
                    response.message.unwrap_or_else(|| "unknown error".to_string())
                ),
            ));
        }
    }

    let result = response.result.unwrap_or_default();
    let entry = result
        .get(token.as_str())
        .or_else(|| result.get(&token.as_str().to_lowercase()))
        .and_then(|v| v.as_object())
        .filter(|m| !m.is_empty());

    match entry {
        Some(entry) => Ok(TokenSecurity::from_entry(entry)),
        None => Err(SourceError::not_found(
            PROVIDER,
            "token not found in GoPlus database (may be a new or unlisted token)",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::addresses;
    use serde_json::json;

    fn decode(value: Value) -> SecurityResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn solana_status_objects_are_read() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let response = decode(json!({
            "code": 1,
            "message": "OK",
            "result": {
                (addresses::BONK): {
                    "mintable": { "status": "0" },
                    "freezable": { "status": "1" }
                }
            }
        }));
        let security = parse_response(response, &token).unwrap();
        assert_eq!(security.mint_authority, AuthorityStatus::Renounced);
        assert_eq!(security.freeze_authority, AuthorityStatus::Active);
    }

    #[test]
    fn explicit_renounce_flags_take_precedence() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let response = decode(json!({
            "result": {
                (addresses::BONK): {
                    "is_mint_authority_renounced": false,
                    "mintable": { "status": "0" },
                    "liquidity_type": "locked",
                    "owner_balance_holder_ratio": "0.12"
                }
            }
        }));
        let security = parse_response(response, &token).unwrap();
        assert_eq!(security.mint_authority, AuthorityStatus::Active);
        assert_eq!(security.freeze_authority, AuthorityStatus::Unknown);
        assert_eq!(security.liquidity_type.as_deref(), Some("locked"));
        assert_eq!(security.owner_balance_holder_ratio, Some(0.12));
    }

    #[test]
    fn evm_entries_are_matched_case_insensitively() {
        let token = TokenAddress::parse(addresses::USDC_ETH).unwrap();
        let response = decode(json!({
            "code": 1,
            "result": {
                (addresses::USDC_ETH): { "is_mintable": "1", "is_honeypot": "0" }
            }
        }));
        let security = parse_response(response, &token).unwrap();
        assert_eq!(security.mint_authority, AuthorityStatus::Active);
        assert_eq!(security.is_honeypot, Some(false));
    }

    #[test]
    fn missing_entry_is_not_found() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let err = parse_response(decode(json!({ "code": 1, "result": {} })), &token).unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let err = parse_response(
            decode(json!({ "code": 2004, "message": "bad address" })),
            &token,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}
