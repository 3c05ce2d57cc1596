//! CertiK audit status client
//!
//! Any non-success status from CertiK means the token has no audit record.

use super::{endpoint, fetch_json, SourceError};
use crate::token::TokenAddress;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PROVIDER: &str = "certik";

/// Audit stage derived from the CertiK record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Audited,
    Pending,
    NotAudited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStatus {
    pub audited: bool,
    pub audit_status: String,
    pub security_score: Option<f64>,
    pub audit_date: Option<String>,
}

impl AuditStatus {
    pub fn audited(security_score: f64) -> Self {
        Self {
            audited: true,
            audit_status: "Audited".to_string(),
            security_score: Some(security_score),
            audit_date: None,
        }
    }

    pub fn not_audited() -> Self {
        Self {
            audited: false,
            audit_status: "Not Audited".to_string(),
            security_score: None,
            audit_date: None,
        }
    }

    pub fn stage(&self) -> AuditStage {
        if self.audited {
            AuditStage::Audited
        } else if self.audit_status.to_lowercase().contains("pending") {
            AuditStage::Pending
        } else {
            AuditStage::NotAudited
        }
    }

    fn from_record(record: &Value) -> Self {
        let audited = record
            .get("audited")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        Self {
            audited,
            audit_status: record
                .get("audit_status")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    let label = if audited { "Audited" } else { "Not Audited" };
                    label.to_string()
                }),
            security_score: record.get("security_score").and_then(|v| v.as_f64()),
            audit_date: record
                .get("audit_date")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

/// CertiK REST client
#[derive(Clone)]
pub struct CertikClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl CertikClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key,
        }
    }

    /// Audit record for a token; a missing record is reported as not audited
    pub async fn audit_status(&self, token: &TokenAddress) -> Result<AuditStatus, SourceError> {
        let path = format!("v1/tokens/{}/{}", token.chain().slug(), token.as_str());
        let url = endpoint(PROVIDER, &self.base_url, &path)?;

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key.expose_secret());
        }

        match fetch_json::<Value>(PROVIDER, request).await {
            Ok(record) => Ok(AuditStatus::from_record(&record)),
            Err(SourceError::Http { .. }) | Err(SourceError::NotFound { .. }) => {
                tracing::debug!(token = %token, "No CertiK audit record");
                Ok(AuditStatus::not_audited())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_fields_are_read() {
        let status = AuditStatus::from_record(&json!({
            "audited": true,
            "audit_status": "Certified",
            "security_score": 88.5,
            "audit_date": "2024-05-01"
        }));
        assert!(status.audited);
        assert_eq!(status.stage(), AuditStage::Audited);
        assert_eq!(status.security_score, Some(88.5));
        assert_eq!(status.audit_date.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn pending_and_missing_records() {
        let pending = AuditStatus::from_record(&json!({ "audit_status": "Audit Pending" }));
        assert_eq!(pending.stage(), AuditStage::Pending);

        let empty = AuditStatus::from_record(&json!({}));
        assert_eq!(empty.audit_status, "Not Audited");
        assert_eq!(empty.stage(), AuditStage::NotAudited);
    }
}
