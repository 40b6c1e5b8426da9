//! Adapter layer: Convert MusicBrainz DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! This isolates API changes - if MusicBrainz changes their response format,
//! only this file and dto.rs need to change.

use super::dto;
use crate::enrichment::domain::{
    Appearance, ArtistRecord, ListedTrack, RecordingRecord, ReleaseRecord, SearchResults,
};

pub fn artists(response: dto::ArtistSearchResponse) -> SearchResults {
    SearchResults::Artists(response.artists.into_iter().map(to_artist).collect())
}

pub fn releases(response: dto::ReleaseSearchResponse) -> SearchResults {
    SearchResults::Releases(response.releases.into_iter().map(to_release).collect())
}

pub fn recordings(response: dto::RecordingSearchResponse) -> SearchResults {
    SearchResults::Recordings(response.recordings.into_iter().map(to_recording).collect())
}

pub fn to_artist(artist: dto::Artist) -> ArtistRecord {
    ArtistRecord {
        id: artist.id,
        name: artist.name,
    }
}

/// Convert a release; the track listing is flattened over all media.
pub fn to_release(release: dto::Release) -> ReleaseRecord {
    let artist = build_artist_string(&release.artist_credit);

    let tracks: Vec<ListedTrack> = release
        .media
        .iter()
        .flat_map(|m| m.tracks.iter())
        .zip(1u32..)
        .map(|(track, position)| ListedTrack {
            position,
            title: track.title.clone().unwrap_or_default(),
        })
        .collect();

    let media_count: u32 = release.media.iter().filter_map(|m| m.track_count).sum();
    let track_count = release
        .track_count
        .or((media_count > 0).then_some(media_count))
        .or((!tracks.is_empty()).then_some(tracks.len() as u32));

    ReleaseRecord {
        id: release.id,
        title: release.title,
        artist,
        date: release.date.filter(|d| !d.is_empty()),
        track_count,
        tracks,
    }
}

pub fn to_recording(recording: dto::Recording) -> RecordingRecord {
    let artist = build_artist_string(&recording.artist_credit);
    let appearances = recording
        .releases
        .iter()
        .map(|release| Appearance {
            release_id: release.id.clone(),
            release_title: release.title.clone(),
            position: appearance_position(release),
        })
        .collect();

    RecordingRecord {
        id: recording.id,
        title: recording.title,
        artist,
        appearances,
    }
}

/// 1-based position of the (single) listed track on a release.
///
/// Search responses carry a zero-based `track-offset`; lookups carry the
/// track's own `position`.
fn appearance_position(release: &dto::Release) -> Option<u32> {
    let medium = release.media.first()?;
    medium
        .track_offset
        .map(|offset| offset + 1)
        .or_else(|| medium.tracks.first().and_then(|t| t.position))
}

/// Build a combined artist string from artist credits
fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }

    let mut result = String::new();
    for credit in credits {
        // Use credited name if available, otherwise official name
        let name = credit.name.as_ref().unwrap_or(&credit.artist.name);
        result.push_str(name);

        // Add join phrase if present (e.g., " & ", " feat. ")
        if let Some(ref join) = credit.joinphrase {
            result.push_str(join);
        }
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(name: &str, join: Option<&str>) -> dto::ArtistCredit {
        dto::ArtistCredit {
            artist: dto::Artist {
                id: format!("{}-id", name),
                name: name.to_string(),
                sort_name: None,
                score: None,
            },
            name: None,
            joinphrase: join.map(String::from),
        }
    }

    fn medium(offset: Option<u32>, titles: &[&str]) -> dto::Medium {
        dto::Medium {
            position: Some(1),
            format: None,
            track_count: Some(titles.len() as u32),
            track_offset: offset,
            tracks: titles
                .iter()
                .enumerate()
                .map(|(i, t)| dto::Track {
                    position: Some(i as u32 + 1),
                    number: None,
                    title: Some(t.to_string()),
                    length: None,
                })
                .collect(),
        }
    }

    fn release(media: Vec<dto::Medium>) -> dto::Release {
        dto::Release {
            id: "rel-1".into(),
            title: "Abbey Road".into(),
            status: Some("Official".into()),
            date: Some("1969-09-26".into()),
            track_count: None,
            artist_credit: vec![credit("The Beatles", None)],
            media,
        }
    }

    #[test]
    fn test_collaboration_artist_string() {
        let credits = vec![credit("Queen", Some(" & ")), credit("David Bowie", Some(""))];
        assert_eq!(
            build_artist_string(&credits),
            Some("Queen & David Bowie".to_string())
        );
        assert_eq!(build_artist_string(&[]), None);
    }

    #[test]
    fn test_release_tracks_flatten_over_media() {
        let record = to_release(release(vec![
            medium(None, &["One", "Two"]),
            medium(None, &["Three"]),
        ]));

        assert_eq!(record.track_count, Some(3));
        let positions: Vec<u32> = record.tracks.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(record.tracks[2].title, "Three");
        assert_eq!(record.artist.as_deref(), Some("The Beatles"));
    }

    #[test]
    fn test_search_track_count_wins() {
        let mut dto = release(vec![]);
        dto.track_count = Some(17);
        assert_eq!(to_release(dto).track_count, Some(17));
    }

    #[test]
    fn test_recording_position_from_offset() {
        let recording = dto::Recording {
            id: "rec-1".into(),
            title: "Something".into(),
            length: None,
            artist_credit: vec![],
            releases: vec![release(vec![medium(Some(1), &["Something"])])],
        };

        let record = to_recording(recording);
        assert_eq!(record.appearances[0].position, Some(2));
        assert_eq!(record.appearances[0].release_title, "Abbey Road");
    }
}
