//! Concurrent risk signal gathering
//!
//! Fans out one request per provider and keeps every outcome, so a failing
//! source becomes a missing factor instead of a failed analysis.

use crate::config::AgentSettings;
use crate::scoring::RiskFactors;
use crate::sources::{
    AuditStatus, HolderDistribution, IncidentCheck, MarketData, Pair, SourceError, TokenMetadata,
    TokenSecurity, TransactionSummary,
};
use crate::token::TokenAddress;
use chrono::{DateTime, Utc};

/// Raw outcome of every provider query for one token
#[derive(Debug)]
pub struct Signals {
    pub pairs: Result<Vec<Pair>, SourceError>,
    pub security: Result<TokenSecurity, SourceError>,
    pub holders: Result<HolderDistribution, SourceError>,
    pub transactions: Result<TransactionSummary, SourceError>,
    pub audit: Result<AuditStatus, SourceError>,
    pub incidents: Result<IncidentCheck, SourceError>,
    pub metadata: Result<TokenMetadata, SourceError>,
}

impl Signals {
    /// Query every provider concurrently
    pub async fn gather(
        market: &dyn MarketData,
        token: &TokenAddress,
        settings: &AgentSettings,
    ) -> Self {
        tracing::debug!(token = %token, "Gathering risk signals");

        let (pairs, security, holders, transactions, audit, incidents, metadata) = futures::join!(
            market.search_pairs(token),
            market.token_security(token),
            market.holders(token, settings.holder_limit),
            market.transactions(token, settings.transaction_limit),
            market.audit_status(token),
            market.incidents(token.short()),
            market.metadata(token),
        );

        let signals = Self {
            pairs,
            security,
            holders,
            transactions,
            audit,
            incidents,
            metadata,
        };

        let failed = signals.failed_sources();
        if !failed.is_empty() {
            tracing::warn!(token = %token, failed = ?failed, "Some risk signals unavailable");
        }
        signals
    }

    /// Most liquid pair, if any
    pub fn primary_pair(&self) -> Option<&Pair> {
        self.pairs.as_ref().ok().and_then(|pairs| pairs.first())
    }

    /// Providers that failed, as `provider: error`
    pub fn failed_sources(&self) -> Vec<String> {
        let errors = [
            self.pairs.as_ref().err(),
            self.security.as_ref().err(),
            self.holders.as_ref().err(),
            self.transactions.as_ref().err(),
            self.audit.as_ref().err(),
            self.incidents.as_ref().err(),
            self.metadata.as_ref().err(),
        ];
        errors
            .into_iter()
            .flatten()
            .map(|e| format!("{}: {}", e.provider(), e.kind()))
            .collect()
    }

    /// Reduce the outcomes to scoring inputs
    pub fn factors(&self, token: &TokenAddress, now: DateTime<Utc>) -> RiskFactors {
        let pair = self.primary_pair();
        let security = self.security.as_ref().ok();

        RiskFactors {
            mint_authority: security.map(|s| s.mint_authority),
            freeze_authority: security.map(|s| s.freeze_authority),
            audit: self.audit.as_ref().ok().map(|a| a.stage()),
            liquidity_usd: pair.and_then(|p| p.liquidity_usd()),
            top10_holder_pct: self.holders.as_ref().ok().map(|h| h.top10_pct),
            age_hours: pair.and_then(|p| p.age_hours(now)),
            incident_found: self.incidents.as_ref().ok().map(|i| i.found),
            transaction_risk: self.transactions.as_ref().ok().map(|t| t.risk_level),
            is_honeypot: security.and_then(|s| s.is_honeypot),
            established: token.known().map(|t| t.is_established).unwrap_or(false),
            failed_sources: self.failed_sources(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::tests::FixtureMarket;
    use crate::sources::AuthorityStatus;
    use crate::token::addresses;

    #[tokio::test]
    async fn healthy_sources_produce_every_factor() {
        let market = FixtureMarket::healthy();
        let token = TokenAddress::parse(addresses::SOL).unwrap();
        let signals = Signals::gather(&market, &token, &AgentSettings::default()).await;

        assert!(signals.failed_sources().is_empty());
        assert_eq!(market.call_count(), 7);

        let factors = signals.factors(&token, Utc::now());
        assert_eq!(factors.mint_authority, Some(AuthorityStatus::Renounced));
        assert_eq!(factors.liquidity_usd, Some(2_500_000.0));
        assert!(factors.age_hours.unwrap() > 24.0 * 300.0);
        assert!(factors.established);
    }

    #[tokio::test]
    async fn failing_sources_leave_factors_empty() {
        let market = FixtureMarket::failing();
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let signals = Signals::gather(&market, &token, &AgentSettings::default()).await;

        assert_eq!(signals.failed_sources().len(), 7);
        let factors = signals.factors(&token, Utc::now());
        assert!(factors.mint_authority.is_none());
        assert!(factors.liquidity_usd.is_none());
        assert!(factors.incident_found.is_none());
        assert_eq!(factors.failed_sources.len(), 7);
    }
}
