//! Adapter layer: Convert AcoustID DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.

use super::dto;
use crate::enrichment::domain::{EnrichmentError, ScoredMatch};
use crate::model::FingerprintMatch;

/// Convert an AcoustID lookup response to scored fingerprint matches
pub fn to_matches(response: dto::LookupResponse) -> Result<Vec<ScoredMatch>, EnrichmentError> {
    if response.status != "ok" {
        let error = response.error.unwrap_or(dto::ApiError {
            code: -1,
            message: "Unknown error".to_string(),
        });
        // Code 14 is "too many requests"
        if error.code == 14 {
            return Err(EnrichmentError::RateLimited);
        }
        return Err(EnrichmentError::ApiError(error.message));
    }

    Ok(response
        .results
        .into_iter()
        .flat_map(|result| {
            let score = result.score;
            result
                .recordings
                .into_iter()
                .map(move |recording| ScoredMatch {
                    score,
                    matched: to_fingerprint_match(recording),
                })
        })
        .collect())
}

fn to_fingerprint_match(recording: dto::Recording) -> FingerprintMatch {
    // Earliest known release year
    let year = recording
        .releases
        .iter()
        .filter_map(|r| r.date.as_ref().and_then(|d| d.year))
        .min()
        .map(|y| y.to_string());

    FingerprintMatch {
        artist: recording.artists.first().map(|a| a.name.clone()),
        title: recording.title,
        // AcoustID carries no genre information
        genre: None,
        year,
        recording_id: Some(recording.id),
    }
}

/// Select the best match from a list (highest score, first on ties)
pub fn best_match(matches: Vec<ScoredMatch>) -> Option<ScoredMatch> {
    matches.into_iter().reduce(|best, candidate| {
        if candidate.score.total_cmp(&best.score).is_gt() {
            candidate
        } else {
            best
        }
    })
}
