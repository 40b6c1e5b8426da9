//! Post-resolution checks run before anything is written.

use std::collections::BTreeSet;

use crate::model::{Field, Release};
use crate::text::{current_year, is_track_number, is_year};

/// A resolved value that cannot be right.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SanityViolation {
    #[error("date {0:?} is not a year between 1600 and {max}", max = current_year() + 1)]
    InvalidDate(String),

    #[error("track number {number:?} of {track} is not between 1 and 99")]
    InvalidTrackNumber { track: String, number: String },

    #[error("track number {0} appears more than once")]
    DuplicateTrackNumber(u32),

    #[error("missing track(s) {0:?}")]
    MissingTracks(Vec<u32>),

    #[error("track total {found:?} does not match the {on_disk} tracks on disk")]
    TrackTotalMismatch { found: String, on_disk: usize },
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value?.trim().parse().ok()
}

/// Validate a fully resolved release. Never mutates it.
pub fn check(release: &Release) -> Result<(), SanityViolation> {
    let date = release.known(Field::Date).unwrap_or_default();
    if !parse_number(Some(date)).is_some_and(is_year) {
        return Err(SanityViolation::InvalidDate(date.to_string()));
    }

    let mut numbers = BTreeSet::new();
    for track in &release.tracks {
        let raw = track.known(Field::TrackNumber);
        let number = parse_number(raw)
            .filter(|n| is_track_number(*n))
            .ok_or_else(|| SanityViolation::InvalidTrackNumber {
                track: track.file_name(),
                number: raw.unwrap_or_default().to_string(),
            })?;
        let number = number as u32;
        if !numbers.insert(number) {
            return Err(SanityViolation::DuplicateTrackNumber(number));
        }
    }

    let tracktotal = release.known(Field::TrackTotal).unwrap_or_default();
    // A total that no track number could reach is left to the count check
    let claimed = parse_number(Some(tracktotal))
        .filter(|n| is_track_number(*n))
        .map_or(0, |n| n as u32);
    let highest = numbers.last().copied().unwrap_or(0).max(claimed);
    let missing: Vec<u32> = (1..=highest).filter(|n| !numbers.contains(n)).collect();
    if !missing.is_empty() {
        return Err(SanityViolation::MissingTracks(missing));
    }

    let on_disk = release.tracks.len();
    if parse_number(Some(tracktotal)) != i64::try_from(on_disk).ok() {
        return Err(SanityViolation::TrackTotalMismatch {
            found: tracktotal.to_string(),
            on_disk,
        });
    }

    Ok(())
}
