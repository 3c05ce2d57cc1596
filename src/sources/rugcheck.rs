//! Rugcheck web lookup
//!
//! Rugcheck exposes no stable public API, so only the presence of an indexed
//! report page is checked and its URL handed to the user.

use super::{endpoint, fetch_text, SourceError};
use crate::token::TokenAddress;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "rugcheck";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RugcheckPage {
    /// The page carries a risk report for the token
    pub indexed: bool,
    pub url: String,
}

#[derive(Clone)]
pub struct RugcheckClient {
    http: Client,
    base_url: String,
}

impl RugcheckClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    pub async fn page(&self, token: &TokenAddress) -> Result<RugcheckPage, SourceError> {
        let path = format!("token/{}", token.as_str());
        let url = endpoint(PROVIDER, &self.base_url, &path)?;
        let public_url = url.to_string();
        let html = fetch_text(PROVIDER, self.http.get(url)).await?;

        Ok(RugcheckPage {
            indexed: mentions_risk(&html),
            url: public_url,
        })
    }
}

fn mentions_risk(html: &str) -> bool {
    html.contains("Risk") || html.contains("risk")
}
