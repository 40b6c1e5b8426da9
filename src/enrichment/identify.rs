//! Fingerprint identification of tracks.
//!
//! Runs fpcalc on a blocking thread, asks the fingerprint service with the
//! shared retry policy, and memoizes the best match (or its absence) per
//! file path. Transport failures are never memoized.

use std::path::Path;
use std::sync::Arc;

use super::acoustid::best_match;
use super::domain::{AudioFingerprint, EnrichmentError};
use super::fingerprint::Fpcalc;
use super::retry::{RetryPolicy, with_retry};
use super::traits::FingerprintLookup;
use crate::cache::{CallSignature, ResultCache};
use crate::control::{Cancelled, Checkpoint, RunContext};
use crate::model::{FingerprintMatch, Release};

const NAMESPACE: &str = "fingerprint";

pub struct Identifier {
    fpcalc: Fpcalc,
    lookup: Arc<dyn FingerprintLookup>,
    cache: Arc<ResultCache>,
    policy: RetryPolicy,
}

impl Identifier {
    pub fn new(
        fpcalc: Fpcalc,
        lookup: Arc<dyn FingerprintLookup>,
        cache: Arc<ResultCache>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            fpcalc,
            lookup,
            cache,
            policy,
        }
    }

    /// Attach a fingerprint match to every track of a release.
    pub async fn attach(&self, release: &mut Release, ctx: &RunContext) -> Result<(), Cancelled> {
        for track in &mut release.tracks {
            ctx.checkpoint(Checkpoint::Step).await?;
            track.fingerprint = self.identify(&track.path).await;
        }
        Ok(())
    }

    /// Best fingerprint match for one file, if any.
    pub async fn identify(&self, path: &Path) -> Option<FingerprintMatch> {
        let signature = CallSignature::new(NAMESPACE, &path.to_string_lossy());
        if let Some(signature) = &signature
            && let Some(cached) = self.cache.get::<Option<FingerprintMatch>>(signature).await
        {
            return cached;
        }

        let fpcalc = self.fpcalc.clone();
        let owned = path.to_path_buf();
        let fingerprint = match tokio::task::spawn_blocking(move || fpcalc.fingerprint(&owned)).await {
            Ok(Ok(fp)) => fp,
            Ok(Err(e)) => {
                tracing::warn!("{}", e);
                // The file won't fingerprint any better next time
                if let Some(signature) = &signature {
                    self.cache.put(signature, &None::<FingerprintMatch>).await;
                }
                return None;
            }
            Err(e) => {
                tracing::warn!("Fingerprint task failed for {}: {}", path.display(), e);
                return None;
            }
        };

        match self.best_for(&fingerprint).await {
            Ok(found) => {
                match &found {
                    Some(m) => tracing::debug!(
                        "Fingerprint of {} matched {:?} by {:?}",
                        path.display(),
                        m.title,
                        m.artist
                    ),
                    None => tracing::debug!("No fingerprint match for {}", path.display()),
                }
                if let Some(signature) = &signature {
                    self.cache.put(signature, &found).await;
                }
                found
            }
            Err(e) => {
                tracing::warn!("Fingerprint lookup abandoned for {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn best_for(
        &self,
        fingerprint: &AudioFingerprint,
    ) -> Result<Option<FingerprintMatch>, EnrichmentError> {
        let lookup = with_retry(self.policy, "fingerprint lookup", || {
            self.lookup.lookup(fingerprint)
        })
        .await;

        match lookup {
            Ok(matches) => Ok(best_match(matches).map(|m| m.matched)),
            Err(EnrichmentError::NoMatches) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
