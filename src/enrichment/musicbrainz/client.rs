//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.
//! The client spaces its own requests; retrying is left to the caller.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{adapter, dto};
use crate::enrichment::domain::{
    EnrichmentError, Entity, Includes, Record, SearchKind, SearchParams, SearchResults,
};

/// Default web service root.
pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";

/// User agent string - MusicBrainz requires this
const USER_AGENT: &str = concat!(
    "TagSleuth/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/tag-sleuth)"
);

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    search_limit: u32,
    last_request: Mutex<Option<Instant>>,
}

impl MusicBrainzClient {
    /// Create a new client
    pub fn new() -> Result<Self, EnrichmentError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against another server (mirror or test server)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, EnrichmentError> {
        let http_client = reqwest::Client::builder()
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EnrichmentError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            min_interval: Duration::from_millis(1100),
            search_limit: 25,
            last_request: Mutex::new(None),
        })
    }

    /// Minimum spacing between requests.
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Page size used when a search doesn't set its own limit.
    pub fn search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit;
        self
    }

    /// Search for artists, releases or recordings.
    pub async fn search(
        &self,
        kind: SearchKind,
        params: &SearchParams,
    ) -> Result<SearchResults, EnrichmentError> {
        if params.is_empty() {
            return Ok(SearchResults::empty(kind));
        }

        let url = format!(
            "{}/{}?query={}&fmt=json&limit={}",
            self.base_url,
            entity_path(kind),
            urlencoding::encode(&build_query(kind, params)),
            params.limit.unwrap_or(self.search_limit)
        );

        match kind {
            SearchKind::Artist => self
                .get_json::<dto::ArtistSearchResponse>(&url)
                .await
                .map(adapter::artists),
            SearchKind::Release => self
                .get_json::<dto::ReleaseSearchResponse>(&url)
                .await
                .map(adapter::releases),
            SearchKind::Recording => self
                .get_json::<dto::RecordingSearchResponse>(&url)
                .await
                .map(adapter::recordings),
        }
    }

    /// Look up one entity by MusicBrainz ID.
    pub async fn fetch_by_id(
        &self,
        entity: Entity,
        id: &str,
        includes: Includes,
    ) -> Result<Record, EnrichmentError> {
        let mut url = format!(
            "{}/{}/{}?fmt=json",
            self.base_url,
            entity_path(entity),
            urlencoding::encode(id)
        );
        let inc = include_param(entity, includes);
        if !inc.is_empty() {
            // `+` must stay literal; it separates include names
            url.push_str("&inc=");
            url.push_str(&inc);
        }

        match entity {
            SearchKind::Artist => self
                .get_json::<dto::Artist>(&url)
                .await
                .map(|a| Record::Artist(adapter::to_artist(a))),
            SearchKind::Release => self
                .get_json::<dto::Release>(&url)
                .await
                .map(|r| Record::Release(adapter::to_release(r))),
            SearchKind::Recording => self
                .get_json::<dto::Recording>(&url)
                .await
                .map(|r| Record::Recording(adapter::to_recording(r))),
        }
    }

    /// Wait until the rate limit allows another request.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Send the HTTP request and parse the response
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, EnrichmentError> {
        self.throttle().await;
        tracing::debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichmentError::Network(e.to_string()))?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EnrichmentError::NoMatches);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::SERVICE_UNAVAILABLE
        {
            return Err(EnrichmentError::RateLimited);
        }

        if !status.is_success() {
            // Try to parse error response
            if let Ok(error) = response.json::<dto::ApiError>().await {
                return Err(EnrichmentError::ApiError(error.error));
            }
            return Err(EnrichmentError::Network(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EnrichmentError::Parse(e.to_string()))
    }
}

fn entity_path(kind: SearchKind) -> &'static str {
    match kind {
        SearchKind::Artist => "artist",
        SearchKind::Release => "release",
        SearchKind::Recording => "recording",
    }
}

fn include_param(entity: Entity, includes: Includes) -> String {
    let mut parts = Vec::new();
    if includes.contains(Includes::TRACKS) && entity == SearchKind::Release {
        parts.push("recordings");
    }
    if includes.contains(Includes::ARTISTS) {
        parts.push(match entity {
            SearchKind::Recording => "artists",
            _ => "artist-credits",
        });
    }
    if includes.contains(Includes::RELEASES) && entity == SearchKind::Recording {
        parts.push("releases+media");
    }
    parts.join("+")
}

/// Escape Lucene special characters inside a quoted phrase.
fn escape_phrase(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the Lucene search expression for a search.
fn build_query(kind: SearchKind, params: &SearchParams) -> String {
    let text_field = match kind {
        SearchKind::Artist => "artist",
        SearchKind::Release => "release",
        SearchKind::Recording => "recording",
    };

    let mut terms = Vec::new();
    let mut push = |field: &str, value: &Option<String>| {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            terms.push(format!("{}:\"{}\"", field, escape_phrase(v)));
        }
    };

    push(text_field, &params.text);
    if kind != SearchKind::Artist {
        push("artist", &params.artist);
    }
    if kind == SearchKind::Recording {
        push("release", &params.release);
    }
    if kind == SearchKind::Release
        && let Some(count) = params
            .track_count
            .as_deref()
            .and_then(|c| c.trim().parse::<u32>().ok())
    {
        terms.push(format!("tracks:{}", count));
    }

    terms.join(" AND ")
}
