//! Contract and project security tools
//!
//! GoPlus authority checks, the Rugcheck report page, SlowMist incidents and
//! CertiK audits.

use super::types::{IncidentInput, TokenInput};
use super::{
    RiskTool, ToolError, TOOL_CERTIK_AUDIT, TOOL_RUGCHECK_ANALYSIS, TOOL_SECURITY_INCIDENTS,
    TOOL_TOKEN_SECURITY,
};
use crate::sources::slowmist::INCIDENT_PAGE;
use crate::sources::{AuthorityStatus, MarketData};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Mint/freeze authority and honeypot checks from GoPlus
pub struct TokenSecurityTool {
    market: Arc<dyn MarketData>,
}

impl TokenSecurityTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

fn authority_risk(mint: AuthorityStatus, freeze: AuthorityStatus) -> &'static str {
    match (mint, freeze) {
        (AuthorityStatus::Active, _) => "high",
        (AuthorityStatus::Renounced, AuthorityStatus::Renounced) => "low",
        _ => "medium",
    }
}

#[async_trait]
impl RiskTool for TokenSecurityTool {
    const NAME: &'static str = TOOL_TOKEN_SECURITY;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Checks a token's contract security with GoPlus: whether the mint and freeze \
         authorities are renounced, liquidity type, owner balance share and honeypot flags. \
         An active mint authority means unlimited supply can be created."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let security = self.market.token_security(&token).await?;

        Ok(json!({
            "status": "success",
            "source": "GoPlus",
            "token": token.as_str(),
            "chain": token.chain(),
            "security_metrics": {
                "mint_authority": security.mint_authority,
                "freeze_authority": security.freeze_authority,
                "liquidity_type": security.liquidity_type,
                "owner_balance_holder_ratio": security.owner_balance_holder_ratio,
                "is_honeypot": security.is_honeypot,
            },
            "risk_level": authority_risk(security.mint_authority, security.freeze_authority),
        }))
    }
}

/// Rugcheck report lookup (Solana)
pub struct RugcheckTool {
    market: Arc<dyn MarketData>,
}

impl RugcheckTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for RugcheckTool {
    const NAME: &'static str = TOOL_RUGCHECK_ANALYSIS;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Looks up the Rugcheck report page for a Solana token and returns its URL and \
         whether Rugcheck has indexed a risk report for it."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let page = self.market.rugcheck(&token).await?;
        let note = if page.indexed {
            "Rugcheck has a risk report for this token; review it for details"
        } else {
            "Token not indexed by Rugcheck"
        };

        Ok(json!({
            "status": "success",
            "source": "Rugcheck",
            "token": token.as_str(),
            "indexed": page.indexed,
            "url": page.url,
            "note": note,
        }))
    }
}

/// SlowMist hacked-incident database search
pub struct SecurityIncidentsTool {
    market: Arc<dyn MarketData>,
}

impl SecurityIncidentsTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for SecurityIncidentsTool {
    const NAME: &'static str = TOOL_SECURITY_INCIDENTS;
    type Input = IncidentInput;

    fn description(&self) -> &'static str {
        "Searches the SlowMist hacked-incident database for a project name or token symbol. \
         A match means the project was involved in a known exploit or rug pull."
    }

    async fn execute(&self, input: IncidentInput) -> Result<Value, ToolError> {
        let project = input.project_name.trim();
        if project.is_empty() {
            return Err(ToolError::InvalidArgument(
                "project_name must not be empty".to_string(),
            ));
        }

        let check = self.market.incidents(project).await?;
        Ok(json!({
            "status": "success",
            "source": "SlowMist",
            "project": check.term,
            "incident_found": check.found,
            "risk_level": if check.found { "critical" } else { "low" },
            "reference": INCIDENT_PAGE,
        }))
    }
}

/// CertiK audit status
pub struct CertikAuditTool {
    market: Arc<dyn MarketData>,
}

impl CertikAuditTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait]
impl RiskTool for CertikAuditTool {
    const NAME: &'static str = TOOL_CERTIK_AUDIT;
    type Input = TokenInput;

    fn description(&self) -> &'static str {
        "Fetches the CertiK audit status and security score of a token contract. \
         Tokens without a CertiK record are reported as not audited."
    }

    async fn execute(&self, input: TokenInput) -> Result<Value, ToolError> {
        let token = input.token()?;
        let audit = self.market.audit_status(&token).await?;

        Ok(json!({
            "status": "success",
            "source": "CertiK",
            "token": token.as_str(),
            "audited": audit.audited,
            "stage": audit.stage(),
            "audit_status": audit.audit_status,
            "security_score": audit.security_score,
            "audit_date": audit.audit_date,
        }))
    }
}
