//! One remote query from start to finish: choose the search, send it, drop
//! results lacking the wanted information, apply the post-filter and pull
//! the requested field out of the surviving record.

use crate::enrichment::domain::{
    ArtistRecord, Includes, Record, RecordingRecord, ReleaseRecord, SearchKind, SearchParams,
    SearchResults,
};
use crate::enrichment::retry::{RetryingClient, Unreachable};
use crate::model::Field;
use crate::text::{about_equal, year_of, zero_pad};

use super::filter::{PostFilter, PreFilter};

/// Record a query settled on.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Artist(ArtistRecord),
    Release(ReleaseRecord),
    Recording(RecordingRecord),
    /// A title from a release's track listing
    Listed(String),
    /// 1-based position of a recording on the matching release
    Appearance(u32),
}

/// Search kind used to look for `field`.
pub fn search_kind(field: Field, has_text: bool) -> SearchKind {
    match field {
        Field::Artist if has_text => SearchKind::Artist,
        Field::Title if has_text => SearchKind::Recording,
        Field::TrackNumber => SearchKind::Recording,
        _ => SearchKind::Release,
    }
}

/// Map the filters and the guess text onto search parameters.
pub fn search_params(kind: SearchKind, text: Option<&str>, pre: &PreFilter) -> SearchParams {
    let text = text.map(str::to_string);
    match kind {
        SearchKind::Artist => SearchParams {
            text,
            limit: Some(1),
            ..Default::default()
        },
        SearchKind::Release => SearchParams {
            text: text.or_else(|| pre.release.clone()),
            artist: pre.artist.clone(),
            track_count: pre.tracktotal.clone(),
            ..Default::default()
        },
        SearchKind::Recording => SearchParams {
            text: text.or_else(|| pre.title.clone()),
            artist: pre.artist.clone(),
            release: pre.release.clone(),
            limit: Some(1),
            ..Default::default()
        },
    }
}

/// Run one query. `Ok(None)` means the remote answered but nothing fit.
pub async fn execute(
    client: &RetryingClient,
    field: Field,
    text: Option<&str>,
    pre: &PreFilter,
    post: &PostFilter,
) -> Result<Option<String>, Unreachable> {
    let kind = search_kind(field, text.is_some());
    let params = search_params(kind, text, pre);
    if params.is_empty() {
        tracing::debug!("Nothing to query {} with", field);
        return Ok(None);
    }

    tracing::debug!(
        "Query for {}: {:?} search, params {:?}, post {:?}",
        field,
        kind,
        params,
        post
    );

    let results = require_desired_info(field, client.search(kind, &params).await?);
    let hit = post_process(client, field, results, post).await?;
    let value = hit.and_then(|hit| parse(&hit, field));

    tracing::debug!("Query result for {}: {:?}", field, value);
    Ok(value)
}

/// Drop results that cannot answer the question at all.
fn require_desired_info(field: Field, results: SearchResults) -> SearchResults {
    match results {
        SearchResults::Releases(releases) if field == Field::Date => SearchResults::Releases(
            releases
                .into_iter()
                .filter(|r| r.date.as_deref().and_then(year_of).is_some())
                .collect(),
        ),
        other => other,
    }
}

async fn release_with_tracks(
    client: &RetryingClient,
    id: &str,
) -> Result<Option<ReleaseRecord>, Unreachable> {
    let record = client
        .fetch_by_id(SearchKind::Release, id, Includes::TRACKS | Includes::ARTISTS)
        .await?;
    Ok(match record {
        Some(Record::Release(release)) => Some(release),
        _ => None,
    })
}

/// Apply the post-filter to search results, best match first.
async fn post_process(
    client: &RetryingClient,
    field: Field,
    results: SearchResults,
    post: &PostFilter,
) -> Result<Option<Hit>, Unreachable> {
    match results {
        SearchResults::Artists(artists) => Ok(artists.into_iter().next().map(Hit::Artist)),
        SearchResults::Releases(releases) => post_process_releases(client, releases, post).await,
        SearchResults::Recordings(recordings) => {
            Ok(post_process_recordings(field, recordings, post))
        }
    }
}

async fn post_process_releases(
    client: &RetryingClient,
    releases: Vec<ReleaseRecord>,
    post: &PostFilter,
) -> Result<Option<Hit>, Unreachable> {
    if releases.is_empty() {
        return Ok(None);
    }

    let mut date_match: Option<&ReleaseRecord> = None;
    if let Some(date) = &post.date {
        date_match = releases
            .iter()
            .find(|r| r.date.as_deref().and_then(year_of) == Some(date.as_str()));
        if date_match.is_none() {
            return Ok(None);
        }
    }

    if let Some(number) = &post.tracknumber {
        let Ok(position) = number.trim().parse::<usize>() else {
            return Ok(None);
        };
        if position == 0 {
            return Ok(None);
        }
        let candidates: Vec<&ReleaseRecord> = match date_match {
            Some(release) => vec![release],
            None => releases.iter().collect(),
        };
        for candidate in candidates {
            if let Some(full) = release_with_tracks(client, &candidate.id).await?
                && let Some(track) = full.tracks.get(position - 1)
            {
                return Ok(Some(Hit::Listed(track.title.clone())));
            }
        }
        return Ok(None);
    }

    if let Some(titles) = &post.tracks {
        for candidate in &releases {
            let Some(full) = release_with_tracks(client, &candidate.id).await? else {
                continue;
            };
            if full.tracks.len() != titles.len() {
                continue;
            }
            let same_titles = titles
                .iter()
                .zip(&full.tracks)
                .all(|(known, listed)| about_equal(known, &listed.title));
            let same_release = date_match.is_none_or(|d| d.id == candidate.id);
            if same_titles && same_release {
                return Ok(Some(Hit::Release(candidate.clone())));
            }
        }
        return Ok(None);
    }

    Ok(date_match
        .or_else(|| releases.first())
        .cloned()
        .map(Hit::Release))
}

fn post_process_recordings(
    field: Field,
    recordings: Vec<RecordingRecord>,
    post: &PostFilter,
) -> Option<Hit> {
    let Some(number) = &post.tracknumber else {
        return recordings.into_iter().next().map(Hit::Recording);
    };
    let position = number.trim().parse::<u32>().ok()?;

    recordings.into_iter().find_map(|recording| {
        let appears = recording
            .appearances
            .iter()
            .any(|a| a.position == Some(position));
        match (appears, field) {
            (false, _) => None,
            (true, Field::TrackNumber) => Some(Hit::Appearance(position)),
            (true, _) => Some(Hit::Recording(recording)),
        }
    })
}

/// Pull `field` out of a hit.
pub fn parse(hit: &Hit, field: Field) -> Option<String> {
    let value = match (hit, field) {
        (Hit::Artist(artist), Field::Artist) => Some(artist.name.clone()),
        (Hit::Release(release), Field::Artist) => release.artist.clone(),
        (Hit::Release(release), Field::Release) => Some(release.title.clone()),
        (Hit::Release(release), Field::Date) => release
            .date
            .as_deref()
            .and_then(year_of)
            .map(str::to_string),
        (Hit::Release(release), Field::TrackTotal) => {
            release.track_count.map(|n| zero_pad(&n.to_string()))
        }
        (Hit::Recording(recording), Field::Title) => Some(recording.title.clone()),
        (Hit::Recording(recording), Field::TrackNumber) => recording
            .appearances
            .first()
            .and_then(|a| a.position)
            .map(|p| zero_pad(&p.to_string())),
        (Hit::Listed(title), _) => Some(title.clone()),
        (Hit::Appearance(position), Field::TrackNumber) => Some(zero_pad(&position.to_string())),
        _ => None,
    };

    if value.is_none() {
        tracing::debug!("No {} in {:?}", field, hit);
    }
    value.filter(|v| !v.trim().is_empty())
}
