//! Fuzzy matching of noisy strings.
//!
//! Tags and file names carry extra words, scene tags, years and track
//! numbers. When a whole string finds nothing, it is split into substrings
//! and each is queried on its own. Several substrings may hit; the filters
//! below remove the least plausible hits one rule at a time and give up
//! unless exactly one remains.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::model::{Field, Metadata};
use crate::text::{about_equal, is_digits, is_track_number, is_year};

/// Characters that separate the meaningful parts of a noisy string.
static DELIMITERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[/()\-~+_\[\]{}*]").unwrap());

/// Hits below this similarity to their source substring are implausible.
const MIN_SIMILARITY: f64 = 0.6;

/// Non-empty, trimmed parts of `text`.
pub fn substrings(text: &str) -> Vec<String> {
    DELIMITERS
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Hit value to the substring that produced it.
pub type Hits = BTreeMap<String, String>;

/// Narrow several hits down to one, or give up.
///
/// `known` is what is known about the track; artist, release and title are
/// mutually exclusive, so a hit equal to another known one of them is wrong.
pub fn disambiguate(field: Field, mut hits: Hits, known: &Metadata) -> Option<String> {
    if hits.len() > 1 {
        tracing::debug!("Several substrings matched: {:?}", hits.keys().collect::<Vec<_>>());

        drop_while_ambiguous(&mut hits, |value, _| {
            is_digits(value)
                && value
                    .parse::<i64>()
                    .is_ok_and(|n| is_track_number(n) || is_year(n))
        });
        drop_while_ambiguous(&mut hits, |value, _| is_digits(value));
        drop_while_ambiguous(&mut hits, |_, source| is_digits(source));

        let related = [Field::Artist, Field::Release, Field::Title]
            .into_iter()
            .filter(|&f| f != field)
            .filter_map(|f| known.get(&f));
        for datum in related {
            drop_while_ambiguous(&mut hits, |value, _| value == datum);
            drop_while_ambiguous(&mut hits, |value, _| about_equal(value, datum));
            drop_while_ambiguous(&mut hits, |value, _| {
                value.to_lowercase().contains(&datum.to_lowercase())
            });
        }

        drop_while_ambiguous(&mut hits, |value, source| {
            strsim::normalized_levenshtein(&source.to_lowercase(), &value.to_lowercase())
                < MIN_SIMILARITY
        });
    }

    if hits.len() == 1 {
        hits.into_keys().next()
    } else {
        if !hits.is_empty() {
            tracing::debug!(
                "Unable to choose between {:?}",
                hits.keys().collect::<Vec<_>>()
            );
        }
        None
    }
}

/// Remove hits matching `reject`, in order, while more than one remains.
fn drop_while_ambiguous(hits: &mut Hits, reject: impl Fn(&str, &str) -> bool) {
    let snapshot: Vec<(String, String)> = hits
        .iter()
        .map(|(v, s)| (v.clone(), s.clone()))
        .collect();
    for (value, source) in snapshot {
        if hits.len() <= 1 {
            break;
        }
        if reject(&value, &source) {
            hits.remove(&value);
        }
    }
}
