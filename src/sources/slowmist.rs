//! SlowMist hacked-incident lookup
//!
//! SlowMist has no search API; the public incident page is fetched and the
//! search term is matched case-insensitively against it.

use super::{endpoint, fetch_text, SourceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

const PROVIDER: &str = "slowmist";

/// Incident page URL shown to users for manual review
pub const INCIDENT_PAGE: &str = "https://hacked.slowmist.io/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentCheck {
    pub term: String,
    /// The term appears in the incident database
    pub found: bool,
}

impl IncidentCheck {
    fn search(term: &str, page: &str) -> Self {
        let needle = term.trim().to_lowercase();
        Self {
            term: term.to_string(),
            found: !needle.is_empty() && page.to_lowercase().contains(&needle),
        }
    }
}

#[derive(Clone)]
pub struct SlowMistClient {
    http: Client,
    base_url: String,
}

impl SlowMistClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    /// Check whether `term` (project name or address prefix) is listed
    pub async fn incidents(&self, term: &str) -> Result<IncidentCheck, SourceError> {
        let url = endpoint(PROVIDER, &self.base_url, "")?;
        let page = fetch_text(PROVIDER, self.http.get(url)).await?;
        let check = IncidentCheck::search(term, &page);
        if check.found {
            tracing::warn!(term, "Term found in SlowMist incident database");
        }
        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_is_case_insensitive() {
        let page = "<html><td>Garden Finance exploit</td></html>";
        assert!(IncidentCheck::search("garden finance", page).found);
        assert!(IncidentCheck::search("GARDEN", page).found);
        assert!(!IncidentCheck::search("Bonk", page).found);
    }

    #[test]
    fn blank_term_never_matches() {
        assert!(!IncidentCheck::search("  ", "anything").found);
    }
}
