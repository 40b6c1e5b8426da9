//! Remote lookups: the music metadata database and audio fingerprinting.
//!
//! # Architecture
//!
//! This module keeps a clean separation between:
//! - **Domain models** (`domain.rs`) - our own record types, serializable for caching
//! - **API DTOs** (`acoustid/dto.rs`, `musicbrainz/dto.rs`) - exact API response shapes
//! - **Adapters** - convert DTOs to domain models
//! - **Clients** - HTTP clients for external APIs
//! - **Traits** (`traits.rs`) - the seams mocks plug into
//! - **Retry** (`retry.rs`) - bounded retries and memoization in front of the remote
//! - **Fingerprint / identify** - fpcalc invocation and memoized best matches
//!
//! API changes stay inside a provider's `dto` and `adapter` files.

pub mod acoustid;
pub mod domain;
pub mod fingerprint;
pub mod identify;
pub mod musicbrainz;
pub mod retry;
pub mod traits;

pub use domain::{
    AudioFingerprint, EnrichmentError, Entity, Includes, Record, SearchKind, SearchParams,
    SearchResults,
};
pub use fingerprint::Fpcalc;
pub use identify::Identifier;
pub use retry::{RetryPolicy, RetryingClient, Unreachable};
pub use traits::{FingerprintLookup, MetadataRemote};
