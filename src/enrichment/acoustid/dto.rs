//! Response shapes of the AcoustID lookup endpoint.
//!
//! Only the parts the adapter reads are modelled; serde ignores the rest.
//! Requested with `meta=recordings+releases`, a response looks like:
//!
//! ```json
//! {
//!   "status": "ok",
//!   "results": [{
//!     "id": "9ff43b6a-4f16-427c-93c2-92307ca505e0",
//!     "score": 0.97,
//!     "recordings": [{
//!       "id": "b9ad642e-b012-41c7-b72a-42cf4911f9ff",
//!       "title": "Come Together",
//!       "artists": [{"id": "b10bbbfc-...", "name": "The Beatles"}],
//!       "releases": [{"id": "...", "title": "Abbey Road", "date": {"year": 1969, "month": 9}}]
//!     }]
//!   }]
//! }
//! ```

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<LookupResult>,
    /// Present when `status` is "error"
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
}

/// One fingerprint hit
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResult {
    pub id: String,
    /// 0.0 to 1.0
    pub score: f32,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recording {
    /// MusicBrainz recording id
    pub id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<PartialDate>,
}

/// Any part of the date may be missing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialDate {
    pub year: Option<u32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}
