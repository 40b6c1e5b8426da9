//! Retrying, memoizing access to the remote metadata database.
//!
//! Every outbound call goes through [`RetryingClient`]: the result cache is
//! consulted first, misses are sent to the remote with a bounded number of
//! retries on transient errors, and successful answers are cached before
//! they are returned. Exhaustion is logged and reported as [`Unreachable`];
//! callers treat it like "found nothing" but must not memoize it.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::domain::{EnrichmentError, Entity, Includes, Record, SearchKind, SearchParams, SearchResults};
use super::traits::MetadataRemote;
use crate::cache::{CallSignature, ResultCache};

/// Bounded linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; the n-th retry waits `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately (for tests).
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    pub fn delay_before(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

/// Run `op` until it succeeds, fails permanently, or the policy is exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, EnrichmentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EnrichmentError>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if retry >= policy.max_retries => {
                tracing::warn!(
                    "{} failed {} times, giving up: {}",
                    label,
                    retry + 1,
                    e
                );
                return Err(e);
            }
            Err(e) => {
                retry += 1;
                let delay = policy.delay_before(retry);
                tracing::info!("{} failed ({}), retrying in {:?}", label, e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// The remote could not be reached within the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("remote unreachable")]
pub struct Unreachable;

/// Cached, retrying front for a [`MetadataRemote`].
pub struct RetryingClient {
    remote: Arc<dyn MetadataRemote>,
    cache: Arc<ResultCache>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(remote: Arc<dyn MetadataRemote>, cache: Arc<ResultCache>, policy: RetryPolicy) -> Self {
        Self {
            remote,
            cache,
            policy,
        }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Search the remote, best match first.
    pub async fn search(
        &self,
        kind: SearchKind,
        params: &SearchParams,
    ) -> Result<SearchResults, Unreachable> {
        let signature = CallSignature::new("search", &(kind, params));
        self.call(signature, "search", || async {
            match self.remote.search(kind, params).await {
                Err(EnrichmentError::NoMatches) => Ok(SearchResults::empty(kind)),
                other => other,
            }
        })
        .await
    }

    /// Fetch a record by id. `Ok(None)` means the id is unknown.
    pub async fn fetch_by_id(
        &self,
        entity: Entity,
        id: &str,
        includes: Includes,
    ) -> Result<Option<Record>, Unreachable> {
        let signature = CallSignature::new("fetch", &(entity, id, includes.bits()));
        self.call(signature, "fetch", || async {
            match self.remote.fetch_by_id(entity, id, includes).await {
                Ok(record) => Ok(Some(record)),
                Err(EnrichmentError::NoMatches) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn call<T, F, Fut>(
        &self,
        signature: Option<CallSignature>,
        label: &str,
        op: F,
    ) -> Result<T, Unreachable>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EnrichmentError>>,
    {
        if let Some(signature) = &signature
            && let Some(hit) = self.cache.get::<T>(signature).await
        {
            return Ok(hit);
        }

        match with_retry(self.policy, label, op).await {
            Ok(value) => {
                if let Some(signature) = &signature {
                    self.cache.put(signature, &value).await;
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("Remote {} abandoned: {}", label, e);
                Err(Unreachable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::domain::ReleaseRecord;
    use crate::enrichment::traits::mocks::MockRemote;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn client(remote: Arc<MockRemote>, policy: RetryPolicy) -> RetryingClient {
        RetryingClient::new(remote, Arc::new(ResultCache::in_memory()), policy)
    }

    fn params(text: &str) -> SearchParams {
        SearchParams {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(3), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_permanent_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(RetryPolicy::immediate(5), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(EnrichmentError::FingerprintError("missing".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_is_bounded() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(RetryPolicy::immediate(3), "test", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(EnrichmentError::Network("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let remote = Arc::new(
            MockRemote::new()
                .with_artist("Queen")
                .failing_with(vec![
                    EnrichmentError::RateLimited,
                    EnrichmentError::Network("reset".into()),
                ]),
        );
        let client = client(remote.clone(), RetryPolicy::immediate(3));

        let results = client.search(SearchKind::Artist, &params("Queen")).await;
        assert_eq!(results.map(|r| r.len()), Ok(1));
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_unreachable_and_not_cached() {
        let remote = Arc::new(MockRemote::new().with_artist("Queen").failing_with(vec![
            EnrichmentError::Network("down".into()),
            EnrichmentError::Network("down".into()),
        ]));
        let client = client(remote.clone(), RetryPolicy::immediate(1));

        assert_eq!(
            client.search(SearchKind::Artist, &params("Queen")).await,
            Err(Unreachable)
        );
        // Next call reaches the remote again and succeeds
        assert!(client.search(SearchKind::Artist, &params("Queen")).await.is_ok());
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn test_identical_calls_hit_remote_once() {
        let remote = Arc::new(MockRemote::new().with_artist("Queen"));
        let client = client(remote.clone(), RetryPolicy::immediate(0));

        assert!(client.search(SearchKind::Artist, &params("Queen")).await.is_ok());
        assert!(client.search(SearchKind::Artist, &params("Queen")).await.is_ok());
        assert_eq!(remote.call_count(), 1);

        assert!(client.search(SearchKind::Artist, &params("Queen ")).await.is_ok());
        assert_eq!(remote.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_empty() {
        let remote = Arc::new(MockRemote::new().with_release(ReleaseRecord {
            id: "rel-1".into(),
            title: "Jazz".into(),
            ..Default::default()
        }));
        let client = client(remote, RetryPolicy::immediate(0));

        assert_eq!(
            client.fetch_by_id(SearchKind::Release, "nope", Includes::TRACKS).await,
            Ok(None)
        );
        assert!(matches!(
            client.fetch_by_id(SearchKind::Release, "rel-1", Includes::TRACKS).await,
            Ok(Some(Record::Release(_)))
        ));
    }
}
