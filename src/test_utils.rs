//! Test utilities and fixtures for tag-sleuth tests.
//!
//! This module provides common fixtures, mock factories and an in-memory
//! tag store to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use tag_sleuth::test_utils::{abbey_road, mock_remote, planner_for};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let planner = planner_for(mock_remote().with_release(abbey_road()));
//!     // ... test logic
//! }
//! ```

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ResultCache;
use crate::enrichment::domain::{ListedTrack, ReleaseRecord};
use crate::enrichment::retry::{RetryPolicy, RetryingClient};
use crate::enrichment::traits::mocks::MockRemote;
use crate::matcher::QueryPlanner;
use crate::metadata::TagStore;
use crate::model::{Metadata, Release, TagValues, Track};

const ABBEY_ROAD_TRACKS: [&str; 17] = [
    "Come Together",
    "Something",
    "Maxwell's Silver Hammer",
    "Oh! Darling",
    "Octopus's Garden",
    "I Want You (She's So Heavy)",
    "Here Comes the Sun",
    "Because",
    "You Never Give Me Your Money",
    "Sun King",
    "Mean Mr. Mustard",
    "Polythene Pam",
    "She Came In Through the Bathroom Window",
    "Golden Slumbers",
    "Carry That Weight",
    "The End",
    "Her Majesty",
];

/// An empty remote; add records with its builder methods.
pub fn mock_remote() -> MockRemote {
    MockRemote::new()
}

/// Abbey Road with its full track listing.
pub fn abbey_road() -> ReleaseRecord {
    ReleaseRecord {
        id: "rel-abbey".into(),
        title: "Abbey Road".into(),
        artist: Some("The Beatles".into()),
        date: Some("1969-09-26".into()),
        track_count: Some(ABBEY_ROAD_TRACKS.len() as u32),
        tracks: ABBEY_ROAD_TRACKS
            .iter()
            .zip(1..)
            .map(|(title, position)| ListedTrack {
                position,
                title: title.to_string(),
            })
            .collect(),
    }
}

/// A retrying client over `remote` that never waits and never retries.
pub fn client_for(remote: MockRemote) -> RetryingClient {
    RetryingClient::new(
        Arc::new(remote),
        Arc::new(ResultCache::in_memory()),
        RetryPolicy::immediate(0),
    )
}

pub fn planner_for(remote: MockRemote) -> QueryPlanner {
    planner_with(Arc::new(remote))
}

/// Like [`planner_for`], keeping a handle on the remote to count calls.
pub fn planner_with(remote: Arc<MockRemote>) -> QueryPlanner {
    QueryPlanner::new(Arc::new(RetryingClient::new(
        remote,
        Arc::new(ResultCache::in_memory()),
        RetryPolicy::immediate(0),
    )))
}

/// An untagged release with one track per file name.
pub fn release_with(files: &[&str]) -> Release {
    let dir = PathBuf::from("/music/incoming/release");
    let tracks = files
        .iter()
        .map(|f| Track::new(dir.join(f), TagValues::new()))
        .collect();
    Release::new(dir, tracks)
}

/// Tag store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryTags {
    current: Mutex<HashMap<PathBuf, TagValues>>,
    written: Mutex<HashMap<PathBuf, Metadata>>,
}

impl MemoryTags {
    /// Tags `read` will report for `path`.
    pub fn with_tags(self, path: impl Into<PathBuf>, tags: TagValues) -> Self {
        self.current.lock().insert(path.into(), tags);
        self
    }

    /// What was last written for `path`, keyed by the path at write time.
    pub fn written(&self, path: &Path) -> Option<Metadata> {
        self.written.lock().get(path).cloned()
    }
}

impl TagStore for MemoryTags {
    fn read(&self, path: &Path) -> Result<TagValues> {
        Ok(self.current.lock().get(path).cloned().unwrap_or_default())
    }

    fn rewrite(&self, path: &Path, metadata: &Metadata) -> Result<()> {
        self.written.lock().insert(path.to_path_buf(), metadata.clone());
        Ok(())
    }
}
