//! Data provider endpoint configuration
//!
//! Each provider base URL is resolved with the same priority chain:
//! 1. Per-provider URL env var (GOPLUS_API_URL, HELIUS_API_URL, etc.) - highest priority
//! 2. A URL built from the provider API key, where the provider needs one in the URL
//! 3. The public endpoint
//!
//! # Examples
//!
//! ```bash
//! # Point DexScreener at a local mock
//! export DEXSCREENER_API_URL="http://127.0.0.1:9000"
//!
//! # Enable the Cambrian MCP tools
//! export CAMBRIAN_API_KEY="YOUR_KEY"
//! ```

use serde::{Deserialize, Serialize};

/// Environment variable names
mod env_vars {
    pub const DEXSCREENER_API_URL: &str = "DEXSCREENER_API_URL";
    pub const GOPLUS_API_URL: &str = "GOPLUS_API_URL";
    pub const HELIUS_API_URL: &str = "HELIUS_API_URL";
    pub const CERTIK_API_URL: &str = "CERTIK_API_URL";
    pub const SLOWMIST_URL: &str = "SLOWMIST_URL";
    pub const SOLSCAN_API_URL: &str = "SOLSCAN_API_URL";
    pub const JUPITER_TOKEN_URL: &str = "JUPITER_TOKEN_URL";
    pub const RUGCHECK_URL: &str = "RUGCHECK_URL";
    pub const CAMBRIAN_MCP_URL: &str = "CAMBRIAN_MCP_URL";
    pub const GEMINI_API_URL: &str = "GEMINI_API_URL";

    pub const CAMBRIAN_API_KEY: &str = "CAMBRIAN_API_KEY";
}

/// Public endpoints
mod public_urls {
    pub const DEXSCREENER: &str = "https://api.dexscreener.com";
    pub const GOPLUS: &str = "https://api.gopluslabs.io";
    pub const HELIUS: &str = "https://api.helius.xyz";
    pub const CERTIK: &str = "https://api.certik.io";
    pub const SLOWMIST: &str = "https://hacked.slowmist.io";
    pub const SOLSCAN: &str = "https://api.solscan.io";
    pub const JUPITER: &str = "https://tokens.jup.ag";
    pub const RUGCHECK: &str = "https://rugcheck.xyz";
    pub const CAMBRIAN_MCP: &str = "https://opabinia.cambrian.network/mcp";
    pub const GEMINI: &str = "https://generativelanguage.googleapis.com/v1beta";
}

/// Base URLs for every upstream the agent talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub dexscreener: String,
    pub goplus: String,
    pub helius: String,
    pub certik: String,
    pub slowmist: String,
    pub solscan: String,
    pub jupiter: String,
    pub rugcheck: String,
    /// Cambrian MCP endpoint; `None` disables the Cambrian tools
    pub cambrian_mcp: Option<String>,
    pub gemini: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            dexscreener: public_urls::DEXSCREENER.to_string(),
            goplus: public_urls::GOPLUS.to_string(),
            helius: public_urls::HELIUS.to_string(),
            certik: public_urls::CERTIK.to_string(),
            slowmist: public_urls::SLOWMIST.to_string(),
            solscan: public_urls::SOLSCAN.to_string(),
            jupiter: public_urls::JUPITER.to_string(),
            rugcheck: public_urls::RUGCHECK.to_string(),
            cambrian_mcp: None,
            gemini: public_urls::GEMINI.to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Resolve endpoints from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Cambrian is only enabled by an explicit URL or an API key
        let cambrian_mcp = match std::env::var(env_vars::CAMBRIAN_MCP_URL) {
            Ok(url) => {
                tracing::debug!("Using CAMBRIAN_MCP_URL for Cambrian");
                Some(url)
            }
            Err(_) if std::env::var(env_vars::CAMBRIAN_API_KEY).is_ok() => {
                tracing::info!("Enabling Cambrian MCP from CAMBRIAN_API_KEY");
                Some(public_urls::CAMBRIAN_MCP.to_string())
            }
            Err(_) => None,
        };

        Self {
            dexscreener: override_url(env_vars::DEXSCREENER_API_URL, defaults.dexscreener),
            goplus: override_url(env_vars::GOPLUS_API_URL, defaults.goplus),
            helius: override_url(env_vars::HELIUS_API_URL, defaults.helius),
            certik: override_url(env_vars::CERTIK_API_URL, defaults.certik),
            slowmist: override_url(env_vars::SLOWMIST_URL, defaults.slowmist),
            solscan: override_url(env_vars::SOLSCAN_API_URL, defaults.solscan),
            jupiter: override_url(env_vars::JUPITER_TOKEN_URL, defaults.jupiter),
            rugcheck: override_url(env_vars::RUGCHECK_URL, defaults.rugcheck),
            cambrian_mcp,
            gemini: override_url(env_vars::GEMINI_API_URL, defaults.gemini),
        }
    }

    /// Point every provider at one base URL (used against local mocks)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            dexscreener: base.clone(),
            goplus: base.clone(),
            helius: base.clone(),
            certik: base.clone(),
            slowmist: base.clone(),
            solscan: base.clone(),
            jupiter: base.clone(),
            rugcheck: base.clone(),
            cambrian_mcp: Some(format!("{}/mcp", base)),
            gemini: base,
        }
    }
}

fn override_url(name: &str, default: String) -> String {
    match std::env::var(name) {
        Ok(url) if !url.trim().is_empty() => {
            tracing::debug!(env = name, "Using endpoint override");
            url.trim_end_matches('/').to_string()
        }
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_public_endpoints() {
        let endpoints = ProviderEndpoints::default();
        assert_eq!(endpoints.dexscreener, "https://api.dexscreener.com");
        assert_eq!(endpoints.goplus, "https://api.gopluslabs.io");
        assert!(endpoints.cambrian_mcp.is_none());
    }

    #[test]
    fn all_at_strips_trailing_slash() {
        let endpoints = ProviderEndpoints::all_at("http://127.0.0.1:9000/");
        assert_eq!(endpoints.helius, "http://127.0.0.1:9000");
        assert_eq!(
            endpoints.cambrian_mcp.as_deref(),
            Some("http://127.0.0.1:9000/mcp")
        );
    }

    #[test]
    fn partial_file_config_keeps_defaults() {
        let parsed: ProviderEndpoints =
            serde_json::from_str(r#"{"goplus":"http://localhost:1"}"#).expect("parse");
        assert_eq!(parsed.goplus, "http://localhost:1");
        assert_eq!(parsed.rugcheck, "https://rugcheck.xyz");
    }
}
