//! Data-source clients
//!
//! Thin HTTP wrappers around the third-party providers. Every client issues
//! one request per logical query and returns a typed result or a
//! [`SourceError`]. The clients are grouped behind the [`MarketData`] trait so
//! orchestration and tests can substitute fixtures; [`ProviderSet`] is the
//! live implementation.

pub mod certik;
pub mod dexscreener;
pub mod goplus;
pub mod helius;
pub mod mcp;
pub mod metadata;
pub mod rugcheck;
pub mod slowmist;

use crate::config::Config;
use crate::token::{Chain, TokenAddress};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub use certik::{AuditStatus, CertikClient};
pub use dexscreener::{DexScreenerClient, Pair};
pub use goplus::{AuthorityStatus, GoPlusClient, TokenSecurity};
pub use helius::{
    ConcentrationRisk, HeliusClient, Holder, HolderDistribution, PatternRisk, TransactionSummary,
};
pub use mcp::{McpClient, McpToolInfo};
pub use metadata::{MetadataClient, TokenMetadata};
pub use rugcheck::{RugcheckClient, RugcheckPage};
pub use slowmist::{IncidentCheck, SlowMistClient};

/// Errors from a data provider
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("{0} request timed out")]
    Timeout(&'static str),

    #[error("{0} rate limit exceeded")]
    RateLimited(&'static str),

    #[error("{provider} returned HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    #[error("{provider} returned a malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },

    #[error("{provider}: {message}")]
    NotFound {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} does not support chain {chain}")]
    Unsupported { provider: &'static str, chain: Chain },

    #[error("{provider} network error: {message}")]
    Network {
        provider: &'static str,
        message: String,
    },

    #[error("{provider} is not configured: {message}")]
    NotConfigured {
        provider: &'static str,
        message: String,
    },
}

impl SourceError {
    pub(crate) fn not_found(provider: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(provider: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Malformed {
            provider,
            message: message.to_string(),
        }
    }

    fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(provider)
        } else if err.is_decode() {
            Self::malformed(provider, err)
        } else if let Some(status) = err.status() {
            Self::from_status(provider, status)
        } else {
            Self::Network {
                provider,
                message: err.to_string(),
            }
        }
    }

    fn from_status(provider: &'static str, status: StatusCode) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(provider),
            StatusCode::NOT_FOUND => Self::not_found(provider, "resource not found"),
            other => Self::Http {
                provider,
                status: other.as_u16(),
            },
        }
    }

    /// Short machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::RateLimited(_) => "rate_limited",
            Self::Http { .. } => "http",
            Self::Malformed { .. } => "malformed",
            Self::NotFound { .. } => "not_found",
            Self::Unsupported { .. } => "unsupported",
            Self::Network { .. } => "network",
            Self::NotConfigured { .. } => "not_configured",
        }
    }

    /// Provider that produced the error
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Timeout(p) | Self::RateLimited(p) => p,
            Self::Http { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::NotFound { provider, .. }
            | Self::Unsupported { provider, .. }
            | Self::Network { provider, .. }
            | Self::NotConfigured { provider, .. } => provider,
        }
    }
}

/// Build the shared HTTP client with a per-request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("defi-risk-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SourceError::NotConfigured {
            provider: "http",
            message: e.to_string(),
        })
}

/// Join `path` onto a provider base URL
pub(crate) fn endpoint(provider: &'static str, base: &str, path: &str) -> Result<Url, SourceError> {
    let base = Url::parse(&format!("{}/", base.trim_end_matches('/'))).map_err(|e| {
        SourceError::NotConfigured {
            provider,
            message: format!("invalid base URL '{}': {}", base, e),
        }
    })?;
    base.join(path.trim_start_matches('/'))
        .map_err(|e| SourceError::NotConfigured {
            provider,
            message: format!("invalid path '{}': {}", path, e),
        })
}

async fn send(provider: &'static str, request: RequestBuilder) -> Result<Response, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(provider, status = status.as_u16(), "Provider returned error status");
        return Err(SourceError::from_status(provider, status));
    }
    Ok(response)
}

/// Send a request and decode the JSON body
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<T, SourceError> {
    let response = send(provider, request).await?;
    let body = response
        .text()
        .await
        .map_err(|e| SourceError::from_reqwest(provider, e))?;
    serde_json::from_str(&body).map_err(|e| SourceError::malformed(provider, e))
}

/// Send a request and return the body as text
pub(crate) async fn fetch_text(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<String, SourceError> {
    let response = send(provider, request).await?;
    response
        .text()
        .await
        .map_err(|e| SourceError::from_reqwest(provider, e))
}

/// Everything the agent needs from the outside world apart from the model
#[async_trait]
pub trait MarketData: Send + Sync {
    /// DexScreener pairs for a token, most liquid first
    async fn search_pairs(&self, token: &TokenAddress) -> Result<Vec<Pair>, SourceError>;

    /// Trending pairs on a chain (at most 10)
    async fn trending(&self, chain: Chain) -> Result<Vec<Pair>, SourceError>;

    /// GoPlus token security flags
    async fn token_security(&self, token: &TokenAddress) -> Result<TokenSecurity, SourceError>;

    /// Helius holder distribution
    async fn holders(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<HolderDistribution, SourceError>;

    /// Helius recent transaction summary
    async fn transactions(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<TransactionSummary, SourceError>;

    /// CertiK audit status
    async fn audit_status(&self, token: &TokenAddress) -> Result<AuditStatus, SourceError>;

    /// SlowMist incident lookup for a project name or address prefix
    async fn incidents(&self, term: &str) -> Result<IncidentCheck, SourceError>;

    /// Solscan metadata with Jupiter fallback
    async fn metadata(&self, token: &TokenAddress) -> Result<TokenMetadata, SourceError>;

    /// Rugcheck page presence
    async fn rugcheck(&self, token: &TokenAddress) -> Result<RugcheckPage, SourceError>;
}

/// Live provider clients sharing one HTTP connection pool
#[derive(Clone)]
pub struct ProviderSet {
    pub dexscreener: DexScreenerClient,
    pub goplus: GoPlusClient,
    pub helius: HeliusClient,
    pub certik: CertikClient,
    pub slowmist: SlowMistClient,
    pub metadata: MetadataClient,
    pub rugcheck: RugcheckClient,
}

impl ProviderSet {
    /// Build every client from configuration
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let http = build_http_client(Duration::from_secs(config.agent.http_timeout_secs))?;
        Ok(Self::with_client(http, config))
    }

    /// Build every client around an existing HTTP client
    pub fn with_client(http: Client, config: &Config) -> Self {
        let endpoints = &config.endpoints;
        Self {
            dexscreener: DexScreenerClient::new(http.clone(), &endpoints.dexscreener),
            goplus: GoPlusClient::new(http.clone(), &endpoints.goplus),
            helius: HeliusClient::new(http.clone(), &endpoints.helius, config.keys.helius.clone()),
            certik: CertikClient::new(http.clone(), &endpoints.certik, config.keys.certik.clone()),
            slowmist: SlowMistClient::new(http.clone(), &endpoints.slowmist),
            metadata: MetadataClient::new(http.clone(), &endpoints.solscan, &endpoints.jupiter),
            rugcheck: RugcheckClient::new(http, &endpoints.rugcheck),
        }
    }
}

#[async_trait]
impl MarketData for ProviderSet {
    async fn search_pairs(&self, token: &TokenAddress) -> Result<Vec<Pair>, SourceError> {
        self.dexscreener.search_pairs(token).await
    }

    async fn trending(&self, chain: Chain) -> Result<Vec<Pair>, SourceError> {
        self.dexscreener.trending(chain).await
    }

    async fn token_security(&self, token: &TokenAddress) -> Result<TokenSecurity, SourceError> {
        self.goplus.token_security(token).await
    }

    async fn holders(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<HolderDistribution, SourceError> {
        self.helius.holders(token, limit).await
    }

    async fn transactions(
        &self,
        token: &TokenAddress,
        limit: u32,
    ) -> Result<TransactionSummary, SourceError> {
        self.helius.transactions(token, limit).await
    }

    async fn audit_status(&self, token: &TokenAddress) -> Result<AuditStatus, SourceError> {
        self.certik.audit_status(token).await
    }

    async fn incidents(&self, term: &str) -> Result<IncidentCheck, SourceError> {
        self.slowmist.incidents(term).await
    }

    async fn metadata(&self, token: &TokenAddress) -> Result<TokenMetadata, SourceError> {
        self.metadata.metadata(token).await
    }

    async fn rugcheck(&self, token: &TokenAddress) -> Result<RugcheckPage, SourceError> {
        self.rugcheck.page(token).await
    }
}
