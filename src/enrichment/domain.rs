//! Internal domain models for remote lookups.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.
//! They are serializable so that results can be memoized by the result cache.

use serde::{Deserialize, Serialize};

use crate::model::FingerprintMatch;

/// Kind of record a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Artist,
    Release,
    Recording,
}

/// Kind of entity to fetch by id.
pub type Entity = SearchKind;

bitflags::bitflags! {
    /// Sub-entities to include when fetching a record by id.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Includes: u8 {
        /// Track listing of a release
        const TRACKS = 0b001;
        /// Artist credits
        const ARTISTS = 0b010;
        /// Releases a recording appears on
        const RELEASES = 0b100;
    }
}

/// Query parameters for a search.
///
/// `text` is the main search string: an artist name for artist searches,
/// a release title for release searches, a recording title for recording
/// searches. The remaining fields narrow the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchParams {
    pub text: Option<String>,
    pub artist: Option<String>,
    pub release: Option<String>,
    pub track_count: Option<String>,
    pub limit: Option<u32>,
}

impl SearchParams {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.artist.is_none()
            && self.release.is_none()
            && self.track_count.is_none()
    }
}

/// An artist as known to the remote database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub id: String,
    pub name: String,
}

/// A release (album, single, EP...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: String,
    pub title: String,
    /// Credited artist string
    pub artist: Option<String>,
    /// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
    pub date: Option<String>,
    pub track_count: Option<u32>,
    /// Only populated when fetched with [`Includes::TRACKS`]
    #[serde(default)]
    pub tracks: Vec<ListedTrack>,
}

/// One entry of a release's track listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedTrack {
    /// 1-based position within the release
    pub position: u32,
    pub title: String,
}

/// A recording (one performance, possibly on several releases).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    #[serde(default)]
    pub appearances: Vec<Appearance>,
}

/// Where a recording appears on a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub release_id: String,
    pub release_title: String,
    /// 1-based position of the recording on the release
    pub position: Option<u32>,
}

/// Ordered results of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchResults {
    Artists(Vec<ArtistRecord>),
    Releases(Vec<ReleaseRecord>),
    Recordings(Vec<RecordingRecord>),
}

impl SearchResults {
    /// An empty result of the given kind.
    pub fn empty(kind: SearchKind) -> Self {
        match kind {
            SearchKind::Artist => Self::Artists(Vec::new()),
            SearchKind::Release => Self::Releases(Vec::new()),
            SearchKind::Recording => Self::Recordings(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Artists(v) => v.len(),
            Self::Releases(v) => v.len(),
            Self::Recordings(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single record fetched by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Artist(ArtistRecord),
    Release(ReleaseRecord),
    Recording(RecordingRecord),
}

/// A fingerprint match with the service's confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    /// Confidence score (0.0 to 1.0)
    pub score: f32,
    pub matched: FingerprintMatch,
}

/// Audio fingerprint for a track
#[derive(Debug, Clone)]
pub struct AudioFingerprint {
    /// The fingerprint string (Chromaprint format)
    pub fingerprint: String,
    /// Duration of the audio in seconds (required by AcoustID)
    pub duration_secs: u32,
}

/// Errors that can occur talking to remote services
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Failed to generate fingerprint: {0}")]
    FingerprintError(String),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No matches found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl EnrichmentError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ApiError(_)
                | Self::Network(_)
                | Self::Parse(_)
                | Self::RateLimited
                | Self::InvalidResponse(_)
        )
    }
}
