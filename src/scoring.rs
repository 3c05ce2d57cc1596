//! Deterministic risk scoring
//!
//! Weighted matrix over five factors with hard overrides. Weights are
//! renormalized over the factors that could be measured, so a missing data
//! source lowers [`DataQuality`] instead of skewing the score.
//!
//! | Factor    | Weight | 10          | 7                      | 4                | 1               |
//! |-----------|--------|-------------|------------------------|------------------|-----------------|
//! | Authority | 30%    | active mint | unknown / active freeze| partial renounce | fully renounced |
//! | Audit     | 20%    | no audit    | pending                |                  | audited         |
//! | Liquidity | 20%    | < $1k       | $1k-$10k               | $10k-$100k       | >= $100k        |
//! | Holders   | 15%    | > 70%       | 50-70%                 | 30-50%           | < 30%           |
//! | Age       | 15%    | < 1 h       | < 24 h                 | 1-30 d           | > 30 d          |

use crate::config::RiskThresholds;
use crate::sources::certik::AuditStage;
use crate::sources::{AuthorityStatus, PatternRisk};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score used when no factor could be measured
pub const INSUFFICIENT_DATA_SCORE: u8 = 7;

/// Floor applied when the mint authority is active
const ACTIVE_MINT_FLOOR: u8 = 8;
/// Floor applied when liquidity is below the critical threshold
const NO_LIQUIDITY_FLOOR: u8 = 8;
/// Floor applied when the project appears in the incident database
const INCIDENT_FLOOR: u8 = 9;

/// A weighted scoring factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Authority,
    Audit,
    Liquidity,
    Holders,
    Age,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Authority,
        Factor::Audit,
        Factor::Liquidity,
        Factor::Holders,
        Factor::Age,
    ];

    pub fn weight(&self) -> f64 {
        match self {
            Factor::Authority => 0.30,
            Factor::Audit => 0.20,
            Factor::Liquidity => 0.20,
            Factor::Holders => 0.15,
            Factor::Age => 0.15,
        }
    }

    /// Provider the factor is measured from
    pub fn source(&self) -> &'static str {
        match self {
            Factor::Authority => "GoPlus",
            Factor::Audit => "CertiK",
            Factor::Liquidity => "DexScreener",
            Factor::Holders => "Helius",
            Factor::Age => "DexScreener",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Factor::Authority => "Authority",
            Factor::Audit => "Audit",
            Factor::Liquidity => "Liquidity",
            Factor::Holders => "Holders",
            Factor::Age => "Age",
        };
        f.write_str(name)
    }
}

/// Risk level band of the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// 1-3 low, 4-6 medium, 7-8 high, 9-10 critical
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => RiskLevel::Low,
            4..=6 => RiskLevel::Medium,
            7..=8 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn verdict(&self) -> Verdict {
        match self {
            RiskLevel::Low => Verdict::Safe,
            RiskLevel::Medium => Verdict::Caution,
            RiskLevel::High => Verdict::Dangerous,
            RiskLevel::Critical => Verdict::Critical,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Safe,
    Caution,
    Dangerous,
    Critical,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Safe => "SAFE",
            Verdict::Caution => "CAUTION",
            Verdict::Dangerous => "DANGEROUS",
            Verdict::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// How much of the scoring matrix could be measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    /// Every factor was measured
    Complete,
    /// Some factors are missing
    Partial,
    /// No factor could be measured
    Insufficient,
}

/// Typed inputs gathered for scoring; `None` means the source failed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskFactors {
    pub mint_authority: Option<AuthorityStatus>,
    pub freeze_authority: Option<AuthorityStatus>,
    pub audit: Option<AuditStage>,
    pub liquidity_usd: Option<f64>,
    pub top10_holder_pct: Option<f64>,
    pub age_hours: Option<f64>,
    pub incident_found: Option<bool>,
    pub transaction_risk: Option<PatternRisk>,
    pub is_honeypot: Option<bool>,
    /// Well-known token from the registry
    pub established: bool,
    /// Providers that could not be reached
    pub failed_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScore {
    pub factor: Factor,
    pub weight: f64,
    pub score: u8,
    pub rationale: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Final score, always within 1..=10
    pub score: u8,
    pub level: RiskLevel,
    pub verdict: Verdict,
    pub sub_scores: Vec<SubScore>,
    pub red_flags: Vec<String>,
    pub data_quality: DataQuality,
    pub failed_sources: Vec<String>,
    pub established: bool,
}

/// Score the gathered factors
pub fn assess(factors: &RiskFactors, thresholds: &RiskThresholds) -> RiskAssessment {
    let sub_scores: Vec<SubScore> = Factor::ALL
        .iter()
        .filter_map(|factor| sub_score(*factor, factors, thresholds))
        .collect();

    let data_quality = match sub_scores.len() {
        0 => DataQuality::Insufficient,
        n if n == Factor::ALL.len() => DataQuality::Complete,
        _ => DataQuality::Partial,
    };

    let base = weighted_score(&sub_scores);
    let score = apply_overrides(base, factors, thresholds);
    let level = RiskLevel::from_score(score);

    RiskAssessment {
        score,
        level,
        verdict: level.verdict(),
        sub_scores,
        red_flags: red_flags(factors, thresholds),
        data_quality,
        failed_sources: factors.failed_sources.clone(),
        established: factors.established,
    }
}

/// Weighted mean over measured factors, rounded and clamped to 1..=10
fn weighted_score(sub_scores: &[SubScore]) -> u8 {
    let total_weight: f64 = sub_scores.iter().map(|s| s.weight).sum();
    if total_weight <= 0.0 {
        return INSUFFICIENT_DATA_SCORE;
    }
    let weighted: f64 = sub_scores
        .iter()
        .map(|s| s.weight * f64::from(s.score))
        .sum::<f64>()
        / total_weight;
    clamp_score(weighted)
}

fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return INSUFFICIENT_DATA_SCORE;
    }
    value.round().clamp(1.0, 10.0) as u8
}

fn apply_overrides(base: u8, factors: &RiskFactors, thresholds: &RiskThresholds) -> u8 {
    let mut score = base;

    if factors.mint_authority == Some(AuthorityStatus::Active) {
        score = score.max(ACTIVE_MINT_FLOOR);
    }
    if matches!(factors.liquidity_usd, Some(l) if l < thresholds.liquidity_critical_usd) {
        score = score.max(NO_LIQUIDITY_FLOOR);
    }
    if factors.incident_found == Some(true) {
        score = score.max(INCIDENT_FLOOR);
    }

    score.clamp(1, 10)
}

fn sub_score(
    factor: Factor,
    factors: &RiskFactors,
    thresholds: &RiskThresholds,
) -> Option<SubScore> {
    let (score, rationale) = match factor {
        Factor::Authority => authority_score(factors.mint_authority, factors.freeze_authority)?,
        Factor::Audit => match factors.audit? {
            AuditStage::Audited => (1, "Audited by CertiK".to_string()),
            AuditStage::Pending => (7, "CertiK audit pending".to_string()),
            AuditStage::NotAudited => (10, "No CertiK audit on record".to_string()),
        },
        Factor::Liquidity => {
            let usd = factors.liquidity_usd?;
            let score = if usd < thresholds.liquidity_critical_usd {
                10
            } else if usd < thresholds.liquidity_high_usd {
                7
            } else if usd < thresholds.liquidity_medium_usd {
                4
            } else {
                1
            };
            (score, format!("Liquidity ${}", format_usd(usd)))
        }
        Factor::Holders => {
            let pct = factors.top10_holder_pct?;
            let score = if pct > thresholds.holders_critical_pct {
                10
            } else if pct > thresholds.holders_high_pct {
                7
            } else if pct > thresholds.holders_medium_pct {
                4
            } else {
                1
            };
            (score, format!("Top 10 holders own {:.1}%", pct))
        }
        Factor::Age => {
            let hours = factors.age_hours?;
            let score = if hours < thresholds.age_critical_hours {
                10
            } else if hours < thresholds.age_high_hours {
                7
            } else if hours <= thresholds.age_medium_days * 24.0 {
                4
            } else {
                1
            };
            (score, format!("Pair age {}", format_age(hours)))
        }
    };

    Some(SubScore {
        factor,
        weight: factor.weight(),
        score,
        rationale,
        source: factor.source().to_string(),
    })
}

fn authority_score(
    mint: Option<AuthorityStatus>,
    freeze: Option<AuthorityStatus>,
) -> Option<(u8, String)> {
    use AuthorityStatus::*;

    if mint.is_none() && freeze.is_none() {
        return None;
    }

    let scored = match (mint.unwrap_or(Unknown), freeze.unwrap_or(Unknown)) {
        (Active, _) => (10, "Mint authority is active"),
        (Renounced, Renounced) => (1, "Mint and freeze authority renounced"),
        (Renounced, Active) => (7, "Freeze authority is active"),
        (Renounced, Unknown) => (4, "Mint renounced, freeze authority unknown"),
        (Unknown, Active) => (7, "Freeze authority is active, mint authority unknown"),
        (Unknown, _) => (7, "Mint authority status unknown"),
    };
    Some((scored.0, scored.1.to_string()))
}

fn red_flags(factors: &RiskFactors, thresholds: &RiskThresholds) -> Vec<String> {
    let mut flags = Vec::new();

    if factors.mint_authority == Some(AuthorityStatus::Active) {
        flags.push("Active mint authority: supply can be inflated at any time".to_string());
    }
    if factors.freeze_authority == Some(AuthorityStatus::Active) {
        flags.push("Active freeze authority: holder accounts can be frozen".to_string());
    }
    if factors.incident_found == Some(true) {
        flags.push("Project mentioned in SlowMist incident database".to_string());
    }
    if factors.is_honeypot == Some(true) {
        flags.push("GoPlus flags the token as a honeypot".to_string());
    }
    if let Some(pct) = factors.top10_holder_pct {
        if pct > thresholds.holders_high_pct {
            flags.push(format!(
                "Top 10 holders control {:.1}% of supply (whale dump risk)",
                pct
            ));
        }
    }
    if let Some(usd) = factors.liquidity_usd {
        if usd < thresholds.liquidity_critical_usd {
            flags.push(format!("Liquidity below ${}", format_usd(thresholds.liquidity_critical_usd)));
        } else if factors.audit == Some(AuditStage::NotAudited) && usd < thresholds.liquidity_medium_usd
        {
            flags.push("No audit and low liquidity".to_string());
        }
    }
    if let Some(hours) = factors.age_hours {
        if hours < thresholds.age_high_hours {
            flags.push(format!("Token pair is only {} old", format_age(hours)));
        }
    }
    if factors.transaction_risk == Some(PatternRisk::High) {
        flags.push("Suspicious recent transaction patterns".to_string());
    }

    flags
}

/// `1234567.8` -> `1,234,568`
pub fn format_usd(value: f64) -> String {
    let rounded = value.round().max(0.0) as u64;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Human-readable age from hours
pub fn format_age(hours: f64) -> String {
    if hours < 1.0 {
        format!("{:.0} min", hours * 60.0)
    } else if hours < 48.0 {
        format!("{:.1} h", hours)
    } else {
        format!("{:.0} d", hours / 24.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> RiskThresholds {
        RiskThresholds::default()
    }

    fn safe_factors() -> RiskFactors {
        RiskFactors {
            mint_authority: Some(AuthorityStatus::Renounced),
            freeze_authority: Some(AuthorityStatus::Renounced),
            audit: Some(AuditStage::Audited),
            liquidity_usd: Some(5_000_000.0),
            top10_holder_pct: Some(12.0),
            age_hours: Some(24.0 * 400.0),
            incident_found: Some(false),
            transaction_risk: Some(PatternRisk::Low),
            is_honeypot: Some(false),
            established: true,
            failed_sources: Vec::new(),
        }
    }

    #[test]
    fn safe_token_scores_low() {
        let assessment = assess(&safe_factors(), &thresholds());
        assert_eq!(assessment.score, 1);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.verdict, Verdict::Safe);
        assert_eq!(assessment.data_quality, DataQuality::Complete);
        assert!(assessment.red_flags.is_empty());
        assert_eq!(assessment.sub_scores.len(), 5);
    }

    #[test]
    fn no_factors_is_insufficient() {
        let assessment = assess(&RiskFactors::default(), &thresholds());
        assert_eq!(assessment.score, INSUFFICIENT_DATA_SCORE);
        assert_eq!(assessment.data_quality, DataQuality::Insufficient);
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(assessment.sub_scores.is_empty());
    }

    #[test]
    fn weights_renormalize_over_present_factors() {
        // Audit (0.2, score 7) + liquidity (0.2, score 1) => 4
        let factors = RiskFactors {
            audit: Some(AuditStage::Pending),
            liquidity_usd: Some(250_000.0),
            ..RiskFactors::default()
        };
        let assessment = assess(&factors, &thresholds());
        assert_eq!(assessment.score, 4);
        assert_eq!(assessment.data_quality, DataQuality::Partial);
    }

    #[test]
    fn active_mint_forces_high_risk() {
        let factors = RiskFactors {
            mint_authority: Some(AuthorityStatus::Active),
            ..safe_factors()
        };
        let assessment = assess(&factors, &thresholds());
        assert!(assessment.score >= 8);
        assert!(assessment.red_flags[0].contains("mint authority"));
    }

    #[test]
    fn tiny_liquidity_forces_high_risk() {
        let factors = RiskFactors {
            liquidity_usd: Some(250.0),
            ..safe_factors()
        };
        let assessment = assess(&factors, &thresholds());
        assert_eq!(assessment.score, 8);
        assert_eq!(assessment.verdict, Verdict::Dangerous);
    }

    #[test]
    fn incident_forces_critical_even_without_factors() {
        let factors = RiskFactors {
            incident_found: Some(true),
            ..RiskFactors::default()
        };
        let assessment = assess(&factors, &thresholds());
        assert_eq!(assessment.score, 9);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert_eq!(assessment.data_quality, DataQuality::Insufficient);
    }

    #[test]
    fn authority_matrix() {
        use AuthorityStatus::*;
        let cases = [
            (Some(Active), Some(Renounced), 10),
            (Some(Renounced), Some(Renounced), 1),
            (Some(Renounced), Some(Active), 7),
            (Some(Renounced), None, 4),
            (Some(Unknown), Some(Unknown), 7),
            (None, Some(Active), 7),
        ];
        for (mint, freeze, expected) in cases {
            let (score, _) = authority_score(mint, freeze).unwrap();
            assert_eq!(score, expected, "mint={mint:?} freeze={freeze:?}");
        }
        assert!(authority_score(None, None).is_none());
    }

    #[test]
    fn age_bands() {
        let t = thresholds();
        let age = |hours: f64| {
            let factors = RiskFactors {
                age_hours: Some(hours),
                ..RiskFactors::default()
            };
            sub_score(Factor::Age, &factors, &t).unwrap().score
        };
        assert_eq!(age(0.5), 10);
        assert_eq!(age(5.0), 7);
        assert_eq!(age(24.0 * 10.0), 4);
        assert_eq!(age(24.0 * 31.0), 1);
    }

    #[test]
    fn score_stays_in_range_for_any_combination() {
        use AuthorityStatus::*;
        let t = thresholds();
        let mints = [None, Some(Active), Some(Renounced), Some(Unknown)];
        let audits = [
            None,
            Some(AuditStage::Audited),
            Some(AuditStage::Pending),
            Some(AuditStage::NotAudited),
        ];
        let liquidity = [None, Some(0.0), Some(5_000.0), Some(1e12), Some(f64::NAN)];
        let holders = [None, Some(0.0), Some(45.0), Some(100.0), Some(-5.0)];
        let ages = [None, Some(0.0), Some(10.0), Some(1e9)];
        let incidents = [None, Some(true), Some(false)];

        for mint in mints {
            for audit in audits {
                for liq in liquidity {
                    for pct in holders {
                        for age in ages {
                            for incident in incidents {
                                let factors = RiskFactors {
                                    mint_authority: mint,
                                    freeze_authority: mint,
                                    audit,
                                    liquidity_usd: liq,
                                    top10_holder_pct: pct,
                                    age_hours: age,
                                    incident_found: incident,
                                    ..RiskFactors::default()
                                };
                                let a = assess(&factors, &t);
                                assert!((1..=10).contains(&a.score), "{factors:?}");
                                assert_eq!(a.level, RiskLevel::from_score(a.score));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_sub_scores() {
        let a = assess(&safe_factors(), &thresholds());
        let b = assess(&safe_factors(), &thresholds());
        assert_eq!(a.sub_scores, b.sub_scores);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn usd_formatting() {
        assert_eq!(format_usd(0.0), "0");
        assert_eq!(format_usd(999.4), "999");
        assert_eq!(format_usd(1_234_567.8), "1,234,568");
    }
}
