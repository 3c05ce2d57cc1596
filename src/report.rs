//! Analysis reports and their Markdown rendering
//!
//! A [`QuickReport`] is exactly a [`TokenOverview`]; a [`RiskReport`] embeds
//! the same overview next to the scored assessment, so every quick field is
//! also present in the full report for the same token.

use crate::scoring::{format_age, format_usd, DataQuality, RiskAssessment, Verdict};
use crate::signals::Signals;
use crate::sources::{AuthorityStatus, Pair};
use crate::token::{Chain, TokenAddress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Market snapshot of a token from its most liquid pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenOverview {
    pub address: String,
    pub chain: Chain,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub fdv_usd: Option<f64>,
    pub pair_created_at: Option<DateTime<Utc>>,
    pub dex: Option<String>,
    pub pair_url: Option<String>,
    /// Well-known token from the registry
    pub established: bool,
}

impl TokenOverview {
    pub fn from_pair(token: &TokenAddress, pair: Option<&Pair>) -> Self {
        let known = token.known();
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Self {
            address: token.as_str().to_string(),
            chain: token.chain(),
            name: pair
                .and_then(|p| non_empty(&p.base_token.name))
                .or_else(|| known.map(|k| k.name.to_string())),
            symbol: pair
                .and_then(|p| non_empty(&p.base_token.symbol))
                .or_else(|| known.map(|k| k.symbol.to_string())),
            price_usd: pair.and_then(|p| p.price_usd),
            liquidity_usd: pair.and_then(|p| p.liquidity_usd()),
            volume_24h_usd: pair.and_then(|p| p.volume.h24),
            price_change_24h_pct: pair.and_then(|p| p.price_change.h24),
            market_cap_usd: pair.and_then(|p| p.market_cap),
            fdv_usd: pair.and_then(|p| p.fdv),
            pair_created_at: pair.and_then(|p| p.created_at()),
            dex: pair.and_then(|p| non_empty(&p.dex_id)),
            pair_url: pair.and_then(|p| p.url.clone()),
            established: known.map(|k| k.is_established).unwrap_or(false),
        }
    }

    /// Symbol, or the shortened address when unknown
    pub fn label(&self) -> String {
        match &self.symbol {
            Some(symbol) => symbol.clone(),
            None => format!("{}...", &self.address[..self.address.len().min(8)]),
        }
    }

    fn write_markdown(&self, out: &mut String, now: DateTime<Utc>) {
        let _ = writeln!(out, "- **Address**: `{}` ({})", self.address, self.chain);
        if let Some(name) = &self.name {
            let _ = writeln!(out, "- **Name**: {}", name);
        }
        if let Some(price) = self.price_usd {
            let _ = writeln!(out, "- **Price**: ${}", format_price(price));
        }
        let _ = writeln!(out, "- **Liquidity**: {}", usd_or_na(self.liquidity_usd));
        let _ = writeln!(out, "- **24h Volume**: {}", usd_or_na(self.volume_24h_usd));
        if let Some(change) = self.price_change_24h_pct {
            let _ = writeln!(out, "- **24h Change**: {:+.2}%", change);
        }
        if let Some(mcap) = self.market_cap_usd.or(self.fdv_usd) {
            let _ = writeln!(out, "- **Market Cap**: ${}", format_usd(mcap));
        }
        if let Some(created) = self.pair_created_at {
            let hours = (now - created).num_seconds().max(0) as f64 / 3600.0;
            let _ = writeln!(out, "- **Pair Age**: {}", format_age(hours));
        }
        if let Some(dex) = &self.dex {
            let _ = writeln!(out, "- **DEX**: {}", dex);
        }
        if let Some(url) = &self.pair_url {
            let _ = writeln!(out, "- **Chart**: {}", url);
        }
    }
}

/// Result of the quick lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuickReport {
    pub overview: TokenOverview,
}

impl QuickReport {
    pub fn render_markdown(&self) -> String {
        let mut out = format!("## 📈 Token Overview: {}\n\n", self.overview.label());
        self.overview.write_markdown(&mut out, Utc::now());
        if self.overview.established {
            out.push_str("\nEstablished token (well-known registry entry).\n");
        }
        out
    }
}

/// Metrics shown in the report, each tied to its source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub liquidity_usd: Option<f64>,
    pub top10_holder_pct: Option<f64>,
    pub audit_status: Option<String>,
    pub mint_authority: Option<AuthorityStatus>,
    pub freeze_authority: Option<AuthorityStatus>,
    pub volume_24h_usd: Option<f64>,
    pub incident_found: Option<bool>,
}

impl KeyMetrics {
    pub fn from_signals(signals: &Signals) -> Self {
        let pair = signals.primary_pair();
        let security = signals.security.as_ref().ok();
        Self {
            liquidity_usd: pair.and_then(|p| p.liquidity_usd()),
            top10_holder_pct: signals.holders.as_ref().ok().map(|h| h.top10_pct),
            audit_status: signals
                .audit
                .as_ref()
                .ok()
                .map(|a| a.audit_status.clone()),
            mint_authority: security.map(|s| s.mint_authority),
            freeze_authority: security.map(|s| s.freeze_authority),
            volume_24h_usd: pair.and_then(|p| p.volume.h24),
            incident_found: signals.incidents.as_ref().ok().map(|i| i.found),
        }
    }
}

/// Full rug-pull risk report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub overview: TokenOverview,
    pub assessment: RiskAssessment,
    pub metrics: KeyMetrics,
    /// Model-written analysis; absent when the model was unavailable
    pub narrative: Option<String>,
    /// Templated recommendation from the verdict
    pub recommendation: String,
    /// Why the narrative is missing
    pub narrative_error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl RiskReport {
    pub fn new(
        overview: TokenOverview,
        assessment: RiskAssessment,
        metrics: KeyMetrics,
        narrative: Result<String, String>,
    ) -> Self {
        let recommendation = recommendation(&assessment);
        let (narrative, narrative_error) = match narrative {
            Ok(text) if !text.trim().is_empty() => (Some(text), None),
            Ok(_) => (None, Some("model returned no text".to_string())),
            Err(e) => (None, Some(e)),
        };
        Self {
            overview,
            assessment,
            metrics,
            narrative,
            recommendation,
            narrative_error,
            generated_at: Utc::now(),
        }
    }

    /// The quick-lookup view of this report
    pub fn quick(&self) -> QuickReport {
        QuickReport {
            overview: self.overview.clone(),
        }
    }

    pub fn render_markdown(&self) -> String {
        match &self.narrative {
            Some(narrative) => {
                let mut out = narrative.trim_end().to_string();
                out.push_str("\n\n---\n");
                self.write_breakdown(&mut out);
                out
            }
            None => self.render_templated(),
        }
    }

    fn render_templated(&self) -> String {
        let a = &self.assessment;
        let m = &self.metrics;
        let mut out = String::new();

        let _ = writeln!(out, "## 🔍 Risk Analysis: {}", self.overview.label());
        let _ = writeln!(out, "**Risk Score: {}/10** - {}\n", a.score, a.level);

        if a.established {
            out.push_str("Established token: deep rug checks skipped.\n\n");
        }

        out.push_str("### 🚨 Red Flags\n");
        if a.red_flags.is_empty() {
            out.push_str("- None detected\n");
        } else {
            for flag in &a.red_flags {
                let _ = writeln!(out, "- {}", flag);
            }
        }

        out.push_str("\n### 📊 Key Metrics\n");
        let _ = writeln!(
            out,
            "- **Liquidity**: {} (Source: DexScreener)",
            usd_or_na(m.liquidity_usd)
        );
        let _ = writeln!(
            out,
            "- **Top 10 Concentration**: {} (Source: Helius)",
            m.top10_holder_pct
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "N/A".to_string())
        );
        let _ = writeln!(
            out,
            "- **Audit Status**: {} (Source: CertiK)",
            m.audit_status.as_deref().unwrap_or("N/A")
        );
        let _ = writeln!(
            out,
            "- **Mint Authority**: {} (Source: GoPlus)",
            authority_label(m.mint_authority)
        );
        let _ = writeln!(
            out,
            "- **Freeze Authority**: {} (Source: GoPlus)",
            authority_label(m.freeze_authority)
        );
        let _ = writeln!(
            out,
            "- **24h Volume**: {} (Source: DexScreener)",
            usd_or_na(m.volume_24h_usd)
        );
        let _ = writeln!(
            out,
            "- **Security Incidents**: {} (Source: SlowMist)",
            match m.incident_found {
                Some(true) => "Found",
                Some(false) => "None",
                None => "N/A",
            }
        );

        out.push_str("\n### 📈 Market\n");
        self.overview.write_markdown(&mut out, self.generated_at);

        out.push('\n');
        self.write_breakdown(&mut out);

        let _ = writeln!(out, "\n### 💡 Verdict\n**{}**\n", a.verdict);
        let _ = writeln!(out, "{}", self.recommendation);
        if let Some(error) = &self.narrative_error {
            let _ = writeln!(out, "\n_Model narrative unavailable: {}_", error);
        }
        out
    }

    fn write_breakdown(&self, out: &mut String) {
        let a = &self.assessment;
        out.push_str("### 🧮 Score Breakdown\n\n");
        out.push_str("| Factor | Weight | Score | Rationale | Source |\n");
        out.push_str("|--------|--------|-------|-----------|--------|\n");
        for sub in &a.sub_scores {
            let _ = writeln!(
                out,
                "| {} | {:.0}% | {}/10 | {} | {} |",
                sub.factor,
                sub.weight * 100.0,
                sub.score,
                sub.rationale,
                sub.source
            );
        }
        let _ = writeln!(
            out,
            "\n**Final score: {}/10 ({}, {})**",
            a.score, a.level, a.verdict
        );

        match a.data_quality {
            DataQuality::Complete => {}
            DataQuality::Partial => {
                out.push_str("\n⚠️ Partial data: some factors could not be measured.\n")
            }
            DataQuality::Insufficient => out.push_str(
                "\n⚠️ Insufficient data: no factor could be measured, the score is a cautious default.\n",
            ),
        }
        if !a.failed_sources.is_empty() {
            let _ = writeln!(out, "Unavailable sources: {}", a.failed_sources.join(", "));
        }
    }
}

/// Recommendation text for a verdict
pub fn recommendation(assessment: &RiskAssessment) -> String {
    let base = match assessment.verdict {
        Verdict::Safe => "No major risk factors found. Standard market risk still applies.",
        Verdict::Caution => {
            "Some risk factors present. Size positions carefully and verify the flags above."
        }
        Verdict::Dangerous => {
            "Multiple serious risk factors. Avoid unless you can independently verify the project."
        }
        Verdict::Critical => "Critical rug-pull indicators. Do not buy this token.",
    };

    match assessment.data_quality {
        DataQuality::Insufficient => format!(
            "{} Most data sources were unavailable, so treat this verdict as unverified.",
            base
        ),
        _ => base.to_string(),
    }
}

fn usd_or_na(value: Option<f64>) -> String {
    value
        .map(|v| format!("${}", format_usd(v)))
        .unwrap_or_else(|| "N/A".to_string())
}

fn authority_label(status: Option<AuthorityStatus>) -> &'static str {
    match status {
        Some(AuthorityStatus::Renounced) => "Renounced",
        Some(AuthorityStatus::Active) => "Active",
        Some(AuthorityStatus::Unknown) => "Unknown",
        None => "N/A",
    }
}

/// Prices below one cent keep their significant digits
fn format_price(price: f64) -> String {
    if price >= 1.0 {
        format!("{:.2}", price)
    } else if price >= 0.01 {
        format!("{:.4}", price)
    } else {
        format!("{:.8}", price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSettings, RiskThresholds};
    use crate::scoring::assess;
    use crate::sources::dexscreener::tests::sample_pair;
    use crate::sources::tests::FixtureMarket;
    use crate::token::addresses;

    async fn report(market: FixtureMarket, narrative: Result<String, String>) -> RiskReport {
        let token = TokenAddress::parse(addresses::SOL).unwrap();
        let signals = Signals::gather(&market, &token, &AgentSettings::default()).await;
        let assessment = assess(&signals.factors(&token, Utc::now()), &RiskThresholds::default());
        RiskReport::new(
            TokenOverview::from_pair(&token, signals.primary_pair()),
            assessment,
            KeyMetrics::from_signals(&signals),
            narrative,
        )
    }

    #[test]
    fn overview_reads_primary_pair() {
        let token = TokenAddress::parse(addresses::SOL).unwrap();
        let pair = sample_pair(2_500_000.0, 400);
        let overview = TokenOverview::from_pair(&token, Some(&pair));
        assert_eq!(overview.symbol.as_deref(), Some("SOL"));
        assert_eq!(overview.price_usd, Some(142.51));
        assert_eq!(overview.liquidity_usd, Some(2_500_000.0));
        assert!(overview.established);
    }

    #[test]
    fn overview_without_pair_falls_back_to_registry() {
        let token = TokenAddress::parse(addresses::BONK).unwrap();
        let overview = TokenOverview::from_pair(&token, None);
        assert_eq!(overview.symbol.as_deref(), Some("BONK"));
        assert!(overview.price_usd.is_none());
    }

    #[test]
    fn quick_report_serializes_as_overview() {
        let token = TokenAddress::parse(addresses::SOL).unwrap();
        let overview = TokenOverview::from_pair(&token, Some(&sample_pair(1.0, 1)));
        let quick = QuickReport {
            overview: overview.clone(),
        };
        assert_eq!(
            serde_json::to_value(&quick).unwrap(),
            serde_json::to_value(&overview).unwrap()
        );
    }

    #[tokio::test]
    async fn templated_report_without_narrative() {
        let report = report(FixtureMarket::healthy(), Err("rate limited".to_string())).await;
        let markdown = report.render_markdown();

        assert!(markdown.contains("## 🔍 Risk Analysis: SOL"));
        assert!(markdown.contains("**Risk Score: 1/10** - LOW"));
        assert!(markdown.contains("- None detected"));
        assert!(markdown.contains("**SAFE**"));
        assert!(markdown.contains("Model narrative unavailable: rate limited"));
    }

    #[tokio::test]
    async fn narrative_report_keeps_breakdown() {
        let report = report(
            FixtureMarket::healthy(),
            Ok("## 🔍 Risk Analysis: SOL\nLooks fine.".to_string()),
        )
        .await;
        let markdown = report.render_markdown();
        assert!(markdown.starts_with("## 🔍 Risk Analysis: SOL\nLooks fine."));
        assert!(markdown.contains("### 🧮 Score Breakdown"));
        assert!(report.narrative_error.is_none());
    }

    #[tokio::test]
    async fn insufficient_data_is_called_out() {
        let report = report(FixtureMarket::failing(), Err("offline".to_string())).await;
        let markdown = report.render_markdown();
        assert!(markdown.contains("Insufficient data"));
        assert!(markdown.contains("Unavailable sources"));
        assert!(report.recommendation.contains("unverified"));
    }

    #[test]
    fn prices_keep_significant_digits() {
        assert_eq!(format_price(142.514), "142.51");
        assert_eq!(format_price(0.5), "0.5000");
        assert_eq!(format_price(0.0000123), "0.00001230");
    }
}
