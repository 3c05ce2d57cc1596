//! Shared tool input types.

use super::ToolError;
use crate::token::{Chain, TokenAddress};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input for tools that take a single token
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenInput {
    /// Token mint (Solana) or contract address (EVM)
    pub token_address: String,
    /// Chain override for EVM addresses; detected from the address when omitted
    #[serde(default)]
    pub chain: Option<Chain>,
}

impl TokenInput {
    /// Validate the address before any provider is queried
    pub fn token(&self) -> Result<TokenAddress, ToolError> {
        TokenAddress::parse_on(&self.token_address, self.chain)
            .map_err(|e| ToolError::InvalidArgument(e.to_string()))
    }
}

/// Input for tools that take a token and a result limit
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LimitedTokenInput {
    /// Token mint (Solana) or contract address (EVM)
    pub token_address: String,
    /// Maximum number of records to fetch
    #[serde(default)]
    pub limit: Option<u32>,
}

impl LimitedTokenInput {
    pub fn token(&self) -> Result<TokenAddress, ToolError> {
        TokenAddress::parse(&self.token_address)
            .map_err(|e| ToolError::InvalidArgument(e.to_string()))
    }

    /// Requested limit, capped at `max`
    pub fn limit_or(&self, max: u32) -> u32 {
        match self.limit {
            Some(0) | None => max,
            Some(n) => n.min(max),
        }
    }
}

/// Input for the incident database search
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IncidentInput {
    /// Project name or token symbol to look up
    pub project_name: String,
}

/// Input for chain-wide listings
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ChainInput {
    /// Chain to list; defaults to solana
    #[serde(default)]
    pub chain: Option<Chain>,
}
