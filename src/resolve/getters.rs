//! Candidate sources.
//!
//! A getter never fails: it either yields a value or logs why it could not
//! and yields nothing.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::matcher::{QueryPlanner, Relevant};
use crate::model::{Field, Guess, Release, Track};
use crate::text::{leading_number, zero_pad};

/// Where a remote getter takes its guess from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessFrom {
    /// No guess: exact query on known data
    Nothing,
    /// The field's current tag
    Tag,
    /// The cleaned file name (or `<dir>/<file>` for release-wide fields)
    FileName,
    /// Number of audio files in the directory
    TrackCount,
}

/// How a getter produces its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Current tag value
    Tag,
    /// Fingerprint match
    Fingerprint,
    /// Remote lookup of the fingerprint's recording id
    FingerprintLookup,
    /// Remote query, optionally matching a guess
    Remote {
        guess: GuessFrom,
        relevant: &'static [Relevant],
    },
    /// One or two digits in the file name
    FileNameDigits,
    /// Number of audio files in the directory
    TrackCount,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Tag => "tag",
            Source::Fingerprint => "fingerprint",
            Source::FingerprintLookup => "fingerprint id lookup",
            Source::Remote { guess, relevant } => match (guess, relevant.is_empty()) {
                (GuessFrom::Nothing, _) => "remote with known data",
                (GuessFrom::Tag, true) => "remote tag match",
                (GuessFrom::Tag, false) => "remote tag match with known data",
                (GuessFrom::FileName, true) => "remote file name match",
                (GuessFrom::FileName, false) => "remote file name match with known data",
                (GuessFrom::TrackCount, _) => "remote track count check",
            },
            Source::FileNameDigits => "file name digits",
            Source::TrackCount => "track count",
        };
        f.write_str(name)
    }
}

/// First one or two digits not preceded by a digit and followed by a non-digit.
static TRACK_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{1,2})[^0-9]").unwrap());

static FOUR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]{4}").unwrap());

static ANY_TRACK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| track_prefix(r"[0-9]{1,2}").unwrap());

/// A track number and the delimiter after it, e.g. `"01 - "` or `"3."`.
fn track_prefix(number: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(^|[^0-9])[ _]*{}(?:[ _]+[-).]?|[ _]*[-).])",
        number
    ))
}

fn is_numeric(field: Field) -> bool {
    matches!(field, Field::TrackNumber | Field::TrackTotal)
}

/// Tag value, keeping only the leading integer of numeric fields.
fn tag_value(track: &Track, field: Field) -> Option<String> {
    let tag = track.tag(field)?;
    if is_numeric(field) {
        leading_number(tag).map(|n| zero_pad(&n))
    } else {
        Some(tag.to_string())
    }
}

/// `<dir>/<file stem>` without the year, for artist and release guesses.
pub fn path_guess(track: &Track) -> Guess {
    let mut path = format!("{}/{}", track.dir_name(), track.file_stem());
    let year = match track.known(Field::Date) {
        Some(date) => Some(date.to_string()),
        None => FOUR_DIGITS.find(&path).map(|m| m.as_str().to_string()),
    };
    if let Some(year) = year.filter(|y| !y.is_empty()) {
        path = path.replace(&year, "");
    }
    Guess::file_path(path)
}

/// File stem without its leading track number, for title guesses.
pub fn title_guess(track: &Track) -> Guess {
    let stem = track.file_stem();
    let known = track
        .known(Field::TrackNumber)
        .and_then(|n| track_prefix(&regex::escape(n)).ok());
    let pattern = known.as_ref().unwrap_or(&ANY_TRACK_PREFIX);

    let cleaned = match pattern.captures(&stem) {
        Some(caps) => {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let lead = caps.get(1).map_or(0, |m| m.len());
            stem.replace(&whole[lead..], "")
        }
        None => stem.clone(),
    };
    Guess::file_name(cleaned.trim())
}

/// Track number from the file name.
pub fn file_name_digits(track: &Track) -> Option<String> {
    TRACK_DIGITS
        .captures(&track.file_name())
        .and_then(|caps| caps.get(1))
        .map(|m| zero_pad(m.as_str()))
}

fn guess_for(
    source: GuessFrom,
    field: Field,
    release: &Release,
    track: &Track,
) -> Result<Option<Guess>, &'static str> {
    match source {
        GuessFrom::Nothing => Ok(None),
        GuessFrom::Tag => tag_value(track, field)
            .map(|tag| Some(Guess::tag(tag)))
            .ok_or("the current tag is empty"),
        GuessFrom::FileName => Ok(Some(match field {
            Field::Title => title_guess(track),
            _ => path_guess(track),
        })),
        GuessFrom::TrackCount => Ok(Some(Guess::tag(zero_pad(&release.tracks.len().to_string())))),
    }
}

/// Produce one candidate value for `field` of track `index`.
pub async fn fetch(
    source: Source,
    field: Field,
    release: &Release,
    index: usize,
    planner: &QueryPlanner,
) -> Option<String> {
    let track = release.tracks.get(index)?;

    let value = match source {
        Source::Tag => tag_value(track, field),
        Source::Fingerprint => track
            .fingerprint
            .as_ref()
            .and_then(|m| m.get(field))
            .map(str::to_string),
        Source::FingerprintLookup => {
            let id = track.fingerprint.as_ref().and_then(|m| m.recording_id.as_deref());
            match id {
                Some(id) => planner.recording_field(id, field).await,
                None => {
                    tracing::debug!("No fingerprint recording id for {}", track.file_name());
                    None
                }
            }
        }
        Source::Remote { guess, relevant } => match guess_for(guess, field, release, track) {
            Ok(guess) => planner.ask(field, guess, release, index, relevant).await,
            Err(reason) => {
                tracing::debug!("Skipping {}: {}", source, reason);
                None
            }
        },
        Source::FileNameDigits => file_name_digits(track),
        Source::TrackCount => Some(zero_pad(&release.tracks.len().to_string())),
    };

    let value = value.filter(|v| !v.trim().is_empty());
    if is_numeric(field) {
        value.map(|v| zero_pad(v.trim()))
    } else {
        value
    }
}
