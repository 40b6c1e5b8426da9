//! Trait definitions for external API clients.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses the real client implementations, while tests
//! can substitute mock implementations.
//!
//! # Example
//!
//! ```ignore
//! use tag_sleuth::enrichment::traits::MetadataRemote;
//!
//! async fn first_release<R: MetadataRemote>(remote: &R, params: &SearchParams) {
//!     let results = remote.search(SearchKind::Release, params).await?;
//! }
//! ```

use async_trait::async_trait;

use super::domain::{
    AudioFingerprint, EnrichmentError, Entity, Includes, Record, ScoredMatch, SearchKind,
    SearchParams, SearchResults,
};

/// Remote music metadata database.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait MetadataRemote: Send + Sync {
    /// Search for records of `kind`, best match first.
    async fn search(
        &self,
        kind: SearchKind,
        params: &SearchParams,
    ) -> Result<SearchResults, EnrichmentError>;

    /// Fetch one record with the requested sub-entities.
    async fn fetch_by_id(
        &self,
        entity: Entity,
        id: &str,
        includes: Includes,
    ) -> Result<Record, EnrichmentError>;
}

/// Trait for fingerprint lookup.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait FingerprintLookup: Send + Sync {
    /// Look up a fingerprint and return possible matches.
    async fn lookup(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<Vec<ScoredMatch>, EnrichmentError>;
}

// Implement traits for real clients

#[async_trait]
impl MetadataRemote for super::musicbrainz::MusicBrainzClient {
    async fn search(
        &self,
        kind: SearchKind,
        params: &SearchParams,
    ) -> Result<SearchResults, EnrichmentError> {
        self.search(kind, params).await
    }

    async fn fetch_by_id(
        &self,
        entity: Entity,
        id: &str,
        includes: Includes,
    ) -> Result<Record, EnrichmentError> {
        self.fetch_by_id(entity, id, includes).await
    }
}

#[async_trait]
impl FingerprintLookup for super::acoustid::AcoustIdClient {
    async fn lookup(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<Vec<ScoredMatch>, EnrichmentError> {
        self.lookup(fingerprint).await
    }
}

/// In-memory remote database for tests.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::enrichment::domain::{ArtistRecord, RecordingRecord, ReleaseRecord};
    use crate::text::about_equal;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock remote that answers searches from fixed record lists.
    ///
    /// Matching is exact after normalization, so tests decide precisely
    /// which strings "exist" remotely.
    #[derive(Default)]
    pub struct MockRemote {
        pub artists: Vec<ArtistRecord>,
        /// Full releases including their track listings
        pub releases: Vec<ReleaseRecord>,
        pub recordings: Vec<RecordingRecord>,
        /// Errors returned (front first) before any real answer
        pub failures: Mutex<VecDeque<EnrichmentError>>,
        /// Number of calls made, including failed ones
        pub calls: AtomicUsize,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_release(mut self, release: ReleaseRecord) -> Self {
            self.releases.push(release);
            self
        }

        pub fn with_artist(mut self, name: &str) -> Self {
            self.artists.push(ArtistRecord {
                id: format!("artist-{}", self.artists.len() + 1),
                name: name.to_string(),
            });
            self
        }

        pub fn with_recording(mut self, recording: RecordingRecord) -> Self {
            self.recordings.push(recording);
            self
        }

        /// Fail the next calls with these errors, in order.
        pub fn failing_with(self, errors: Vec<EnrichmentError>) -> Self {
            *self.failures.lock() = errors.into();
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn begin_call(&self) -> Result<(), EnrichmentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn matches(wanted: &Option<String>, actual: Option<&str>) -> bool {
        match (wanted, actual) {
            (None, _) => true,
            (Some(w), Some(a)) => about_equal(w, a),
            (Some(_), None) => false,
        }
    }

    fn limited<T>(items: Vec<T>, limit: Option<u32>) -> Vec<T> {
        match limit {
            Some(n) => items.into_iter().take(n as usize).collect(),
            None => items,
        }
    }

    #[async_trait]
    impl MetadataRemote for MockRemote {
        async fn search(
            &self,
            kind: SearchKind,
            params: &SearchParams,
        ) -> Result<SearchResults, EnrichmentError> {
            self.begin_call()?;
            let results = match kind {
                SearchKind::Artist => SearchResults::Artists(limited(
                    self.artists
                        .iter()
                        .filter(|a| matches(&params.text, Some(&a.name)))
                        .cloned()
                        .collect(),
                    params.limit,
                )),
                SearchKind::Release => SearchResults::Releases(limited(
                    self.releases
                        .iter()
                        .filter(|r| matches(&params.text, Some(&r.title)))
                        .filter(|r| matches(&params.artist, r.artist.as_deref()))
                        .filter(|r| {
                            let count = r.track_count.map(|c| c.to_string());
                            let wanted = params
                                .track_count
                                .as_ref()
                                .map(|c| c.trim_start_matches('0').to_string());
                            matches(&wanted, count.as_deref())
                        })
                        .map(|r| ReleaseRecord {
                            tracks: Vec::new(),
                            ..r.clone()
                        })
                        .collect(),
                    params.limit,
                )),
                SearchKind::Recording => SearchResults::Recordings(limited(
                    self.recordings
                        .iter()
                        .filter(|r| matches(&params.text, Some(&r.title)))
                        .filter(|r| matches(&params.artist, r.artist.as_deref()))
                        .filter(|r| {
                            params.release.is_none()
                                || r.appearances
                                    .iter()
                                    .any(|a| matches(&params.release, Some(&a.release_title)))
                        })
                        .cloned()
                        .collect(),
                    params.limit,
                )),
            };
            Ok(results)
        }

        async fn fetch_by_id(
            &self,
            entity: Entity,
            id: &str,
            _includes: Includes,
        ) -> Result<Record, EnrichmentError> {
            self.begin_call()?;
            let found = match entity {
                SearchKind::Artist => self
                    .artists
                    .iter()
                    .find(|a| a.id == id)
                    .cloned()
                    .map(Record::Artist),
                SearchKind::Release => self
                    .releases
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
                    .map(Record::Release),
                SearchKind::Recording => self
                    .recordings
                    .iter()
                    .find(|r| r.id == id)
                    .cloned()
                    .map(Record::Recording),
            };
            found.ok_or(EnrichmentError::NoMatches)
        }
    }

    /// Mock fingerprint service returning predefined matches.
    pub struct MockFingerprints {
        pub results: Vec<ScoredMatch>,
        /// Error to return (takes precedence over results)
        pub error: Option<EnrichmentError>,
    }

    impl MockFingerprints {
        pub fn no_matches() -> Self {
            Self {
                results: vec![],
                error: None,
            }
        }

        pub fn with_error(error: EnrichmentError) -> Self {
            Self {
                results: vec![],
                error: Some(error),
            }
        }
    }

    #[async_trait]
    impl FingerprintLookup for MockFingerprints {
        async fn lookup(
            &self,
            _fingerprint: &AudioFingerprint,
        ) -> Result<Vec<ScoredMatch>, EnrichmentError> {
            if let Some(ref err) = self.error {
                return Err(err.clone());
            }
            Ok(self.results.clone())
        }
    }
}
