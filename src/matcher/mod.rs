//! Asking the remote metadata database about one field of one track.
//!
//! [`QueryPlanner::ask`] is the single entry point the getters use. It
//! builds filters from known data, then either runs one exact query (no
//! guess) or fuzzily matches a guess: the whole string first, then each
//! substring, keeping the answer only if exactly one plausible hit remains.
//!
//! Whole query executions are memoized in the result cache under the
//! `query` namespace, unless the remote was unreachable.

pub mod filter;
pub mod fuzzy;
pub mod query;

use std::sync::Arc;

use crate::cache::CallSignature;
use crate::enrichment::domain::{Includes, Record, SearchKind};
use crate::enrichment::retry::{RetryingClient, Unreachable};
use crate::model::{Field, Guess, GuessKind, Metadata, Release};
use crate::text::restrict_chars;

pub use filter::{PostFilter, PreFilter, Relevant};

pub struct QueryPlanner {
    client: Arc<RetryingClient>,
}

impl QueryPlanner {
    pub fn new(client: Arc<RetryingClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RetryingClient {
        &self.client
    }

    /// Ask the remote for `field` of track `index`, optionally matching `guess`.
    pub async fn ask(
        &self,
        field: Field,
        guess: Option<Guess>,
        release: &Release,
        index: usize,
        relevant: &[Relevant],
    ) -> Option<String> {
        let (pre, post, guess) = filter::construct(field, guess, release, index, relevant);
        let known = release
            .tracks
            .get(index)
            .map(|t| t.metadata.clone())
            .unwrap_or_else(|| release.metadata.clone());

        match guess {
            None => self.execute(field, None, &pre, &post).await,
            Some(guess) => self.fuzzy(field, guess, &pre, &post, &known).await,
        }
    }

    /// Artist or title of a recording identified by its remote id.
    pub async fn recording_field(&self, recording_id: &str, field: Field) -> Option<String> {
        let record = self
            .client
            .fetch_by_id(SearchKind::Recording, recording_id, Includes::ARTISTS)
            .await
            .ok()
            .flatten();

        let value = match record {
            Some(Record::Recording(recording)) => match field {
                Field::Artist => recording.artist,
                Field::Title => Some(recording.title),
                _ => None,
            },
            _ => {
                tracing::debug!("Remote does not know recording {}", recording_id);
                None
            }
        };
        value.filter(|v| !v.trim().is_empty())
    }

    async fn fuzzy(
        &self,
        field: Field,
        guess: Guess,
        pre: &PreFilter,
        post: &PostFilter,
        known: &Metadata,
    ) -> Option<String> {
        let text = restrict_chars(&guess.text);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        tracing::debug!("Fuzzily matching {:?} on {}", text, field);

        let whole: Vec<&str> = match (guess.kind, text.rsplit_once('/')) {
            // The directory usually names the artist or release better
            (GuessKind::FilePath, Some((dir, file))) => vec![dir, file],
            _ => vec![text],
        };
        for part in whole {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(found) = self.execute(field, Some(part), pre, post).await {
                return Some(found);
            }
        }

        let substrings = fuzzy::substrings(text);
        tracing::debug!("No match for the full string; trying {:?}", substrings);

        let mut hits = fuzzy::Hits::new();
        for substring in substrings {
            if let Some(found) = self.execute(field, Some(&substring), pre, post).await {
                hits.insert(found, substring);
            }
        }

        let chosen = fuzzy::disambiguate(field, hits, known);
        match &chosen {
            Some(value) => tracing::debug!("Matched a string to {} {:?}", field, value),
            None => tracing::debug!("Fuzzy matching on {} failed", field),
        }
        chosen
    }

    /// One memoized query execution.
    async fn execute(
        &self,
        field: Field,
        text: Option<&str>,
        pre: &PreFilter,
        post: &PostFilter,
    ) -> Option<String> {
        let signature = CallSignature::new("query", &(field, text, pre, post));
        let cache = self.client.cache();
        if let Some(signature) = &signature
            && let Some(cached) = cache.get::<Option<String>>(signature).await
        {
            return cached;
        }

        match query::execute(&self.client, field, text, pre, post).await {
            Ok(value) => {
                if let Some(signature) = &signature {
                    cache.put(signature, &value).await;
                }
                value
            }
            Err(Unreachable) => None,
        }
    }
}
