//! HTTP client for resolving a public profile page into an external identity.
//!
//! A community member proves which room identity belongs to them by linking a
//! profile page that displays that identity. The client fetches the page and
//! extracts the identity with a CSS selector, so different profile providers
//! can be supported by configuration alone.

use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("profile page returned status {0}")]
    Status(StatusCode),

    #[error("invalid identity selector: {0}")]
    Selector(String),

    #[error("no external identity found on profile page")]
    NotFound,
}

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    /// CSS selector matching the element whose text is the external identity.
    pub identity_selector: String,
}

#[derive(Debug, Clone)]
pub struct ProfileClient {
    options: ProfileOptions,
    client: Client,
}

impl ProfileClient {
    pub fn new(options: ProfileOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    /// Fetch a profile page and extract the external identity from it.
    pub async fn resolve(&self, profile_link: &str) -> Result<String, ProfileError> {
        let response = self.client.get(profile_link).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Status(status));
        }

        let body = response.text().await?;
        extract_identity(&body, &self.options.identity_selector)
    }
}

/// Extract the external identity from profile page HTML.
///
/// Takes the first element matched by `selector` and returns its trimmed
/// text. Whitespace-only matches count as not found.
pub fn extract_identity(html: &str, selector: &str) -> Result<String, ProfileError> {
    let selector =
        Selector::parse(selector).map_err(|e| ProfileError::Selector(e.to_string()))?;

    let document = Html::parse_document(html);
    let identity = document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty());

    identity.ok_or(ProfileError::NotFound)
}
