//! Core data models for release resolution.
//!
//! Defines the primary entities: [`Release`] (one audio directory) and
//! [`Track`] (one audio file), plus the [`Field`] vocabulary shared by the
//! finders, the query planner and the tag codec.
//!
//! # Known data
//!
//! A field is "known" once its finder has produced a consensus and stored
//! it through [`Release::store`] or [`Track::store`]. Release-scoped values
//! are copied into every track so that a track's `metadata` is always the
//! complete view of what is known about it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A metadata field the resolver can determine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Artist,
    Release,
    Date,
    #[serde(rename = "tracktotal")]
    TrackTotal,
    Genre,
    Title,
    #[serde(rename = "tracknumber")]
    TrackNumber,
}

impl Field {
    /// Every field, in resolution order.
    pub const ALL: [Field; 7] = [
        Field::Artist,
        Field::Release,
        Field::Date,
        Field::TrackTotal,
        Field::Genre,
        Field::Title,
        Field::TrackNumber,
    ];

    /// Stable lowercase name used in logs and cache signatures.
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Artist => "artist",
            Field::Release => "release",
            Field::Date => "date",
            Field::TrackTotal => "tracktotal",
            Field::Genre => "genre",
            Field::Title => "title",
            Field::TrackNumber => "tracknumber",
        }
    }

    /// Whether one value is shared by every track of a release.
    pub fn is_release_scoped(self) -> bool {
        !matches!(self, Field::Title | Field::TrackNumber)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved values, keyed by field.
pub type Metadata = BTreeMap<Field, String>;

/// Tag values as currently found on disk (possibly empty strings).
pub type TagValues = BTreeMap<Field, String>;

/// Result of an acoustic fingerprint lookup.
///
/// Every part is optional: a fingerprint service frequently recognises the
/// audio but knows nothing beyond a recording id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintMatch {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    /// Remote database id of the recording
    pub recording_id: Option<String>,
}

impl FingerprintMatch {
    /// The value this match offers for a field, if any.
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Artist => self.artist.as_deref(),
            Field::Title => self.title.as_deref(),
            Field::Genre => self.genre.as_deref(),
            Field::Date => self.year.as_deref(),
            _ => None,
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

/// One audio file within a release.
#[derive(Debug, Clone)]
pub struct Track {
    /// Current location of the file
    pub path: PathBuf,
    /// Tags read from the file when the release was scanned
    pub tags: TagValues,
    /// Fingerprint match, if one was looked up and found
    pub fingerprint: Option<FingerprintMatch>,
    /// Known (resolved) values for this track
    pub metadata: Metadata,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>, tags: TagValues) -> Self {
        Self {
            path: path.into(),
            tags,
            fingerprint: None,
            metadata: Metadata::new(),
        }
    }

    /// Non-empty tag value for `field`.
    pub fn tag(&self, field: Field) -> Option<&str> {
        self.tags
            .get(&field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Known value for `field`.
    pub fn known(&self, field: Field) -> Option<&str> {
        self.metadata.get(&field).map(String::as_str)
    }

    pub fn is_known(&self, field: Field) -> bool {
        self.metadata.contains_key(&field)
    }

    pub fn store(&mut self, field: Field, value: impl Into<String>) {
        self.metadata.insert(field, value.into());
    }

    /// File name including extension.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without extension.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Name of the directory containing the file.
    pub fn dir_name(&self) -> String {
        self.path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One audio directory: the unit that is resolved, written and moved.
#[derive(Debug, Clone)]
pub struct Release {
    pub dir: PathBuf,
    /// Tracks ordered by file path
    pub tracks: Vec<Track>,
    /// Known release-scoped values
    pub metadata: Metadata,
}

impl Release {
    pub fn new(dir: impl Into<PathBuf>, mut tracks: Vec<Track>) -> Self {
        tracks.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            dir: dir.into(),
            tracks,
            metadata: Metadata::new(),
        }
    }

    /// Store a release-scoped value and copy it into every track.
    pub fn store(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        for track in &mut self.tracks {
            track.store(field, value.clone());
        }
        self.metadata.insert(field, value);
    }

    pub fn known(&self, field: Field) -> Option<&str> {
        self.metadata.get(&field).map(String::as_str)
    }

    /// Titles of every track in order, if every title is known.
    pub fn known_titles(&self) -> Option<Vec<String>> {
        if self.tracks.is_empty() {
            return None;
        }
        self.tracks
            .iter()
            .map(|t| t.known(Field::Title).map(str::to_string))
            .collect()
    }

    /// Short label for logs.
    pub fn label(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.dir.display().to_string())
    }
}

/// How a guess string was obtained, which decides how it is split when
/// fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuessKind {
    /// Value of an existing tag
    TagValue,
    /// A cleaned file name
    FileName,
    /// `<directory>/<file stem>`; the directory part is tried first
    FilePath,
}

/// A possibly unreliable string that a field might be equal to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guess {
    pub text: String,
    pub kind: GuessKind,
}

impl Guess {
    pub fn tag(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: GuessKind::TagValue,
        }
    }

    pub fn file_name(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: GuessKind::FileName,
        }
    }

    pub fn file_path(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: GuessKind::FilePath,
        }
    }
}
