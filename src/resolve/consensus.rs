//! Weighted voting over candidate values.

use std::collections::BTreeMap;

use crate::text::squash;

/// One getter's answer for one track.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: Option<String>,
    pub weight: f64,
    /// Name of the getter that produced it
    pub source: String,
    /// File name of the track it was produced for
    pub track: String,
}

/// Grouping key: case and punctuation are ignored.
fn group_key(value: &str) -> String {
    let squashed = squash(value);
    if squashed.is_empty() {
        value.to_lowercase()
    } else {
        squashed
    }
}

/// The winning value, or `None` without any non-empty candidate.
///
/// Weights are summed per group of near-identical values; within the
/// heaviest group the heaviest exact spelling wins. Ties go to the
/// lexicographically smallest value so the result never depends on the
/// order candidates arrive in.
pub fn consensus(candidates: &[Candidate]) -> Option<String> {
    let mut exact: BTreeMap<&str, f64> = BTreeMap::new();
    for candidate in candidates {
        let Some(value) = candidate.value.as_deref() else {
            continue;
        };
        if value.trim().is_empty() {
            continue;
        }
        *exact.entry(value).or_default() += candidate.weight;
    }

    let mut groups: BTreeMap<String, (f64, Vec<(&str, f64)>)> = BTreeMap::new();
    for (&value, &score) in &exact {
        let group = groups.entry(group_key(value)).or_default();
        group.0 += score;
        group.1.push((value, score));
    }

    let (_, (group_score, members)) = groups
        .iter()
        .max_by(|(ka, (sa, _)), (kb, (sb, _))| sa.total_cmp(sb).then_with(|| kb.cmp(ka)))?;

    let (winner, score) = members
        .iter()
        .max_by(|(va, sa), (vb, sb)| sa.total_cmp(sb).then_with(|| vb.cmp(va)))?;

    tracing::debug!(
        "Consensus {:?} with {} points (group total {})",
        winner,
        score,
        group_score
    );
    Some(winner.to_string())
}
