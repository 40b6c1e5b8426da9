//! AcoustID HTTP client
//!
//! Handles communication with the AcoustID web service.
//! See: https://acoustid.org/webservice
//!
//! ## URL encoding of the meta parameter
//! The API uses `+` as a separator in `meta` (e.g. `recordings+releases`).
//! `%2B` is NOT recognized as a separator and the API silently returns
//! results without metadata, so the URL is built by hand.
//!
//! GET is used rather than POST: fingerprints (~3400 chars) fit in URLs and
//! POST lookups have been seen to drop the requested metadata.

use super::{adapter, dto};
use crate::enrichment::domain::{AudioFingerprint, EnrichmentError, ScoredMatch};

const DEFAULT_LOOKUP_URL: &str = "https://api.acoustid.org/v2/lookup";

/// AcoustID API client
pub struct AcoustIdClient {
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
}

impl AcoustIdClient {
    /// Create a new client with the given API key
    pub fn new(api_key: impl Into<String>) -> Result<Self, EnrichmentError> {
        Self::with_base_url(api_key, DEFAULT_LOOKUP_URL)
    }

    /// Create a client against another lookup endpoint
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| EnrichmentError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Look up a fingerprint and return every scored match
    pub async fn lookup(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<Vec<ScoredMatch>, EnrichmentError> {
        let response = self.send_lookup_request(fingerprint).await?;
        adapter::to_matches(response)
    }

    fn lookup_url(&self, fingerprint: &AudioFingerprint) -> String {
        // The + separators must stay literal
        format!(
            "{}?client={}&duration={}&fingerprint={}&meta=recordings+releases+compress",
            self.base_url,
            urlencoding::encode(&self.api_key),
            fingerprint.duration_secs,
            urlencoding::encode(&fingerprint.fingerprint)
        )
    }

    async fn send_lookup_request(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<dto::LookupResponse, EnrichmentError> {
        let response = self
            .http_client
            .get(self.lookup_url(fingerprint))
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EnrichmentError::RateLimited);
        }

        // Error bodies are JSON too; let the adapter classify them
        if !status.is_success() && !status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<dto::LookupResponse>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}
