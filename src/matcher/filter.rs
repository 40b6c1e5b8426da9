//! Pre- and post-query filters built from already known data.
//!
//! Artist, release, track count and title can be sent to the remote as
//! search parameters. Date, track position and the ordered title list can
//! only be checked against what comes back.

use serde::Serialize;

use crate::model::{Field, Guess, Release};

/// Known data a query may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevant {
    Field(Field),
    /// Ordered titles of every track in the release
    Tracks,
}

impl Relevant {
    pub const ARTIST: Relevant = Relevant::Field(Field::Artist);
    pub const RELEASE: Relevant = Relevant::Field(Field::Release);
    pub const DATE: Relevant = Relevant::Field(Field::Date);
    pub const TRACKTOTAL: Relevant = Relevant::Field(Field::TrackTotal);
    pub const TITLE: Relevant = Relevant::Field(Field::Title);
    pub const TRACKNUMBER: Relevant = Relevant::Field(Field::TrackNumber);
    pub const TRACKS: Relevant = Relevant::Tracks;
}

/// Values sent with the search itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreFilter {
    pub artist: Option<String>,
    pub release: Option<String>,
    pub tracktotal: Option<String>,
    pub title: Option<String>,
}

/// Values checked against the search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostFilter {
    /// Year the release must have been issued in
    pub date: Option<String>,
    /// 1-based position of the wanted track
    pub tracknumber: Option<String>,
    /// Track titles the release must list, in order
    pub tracks: Option<Vec<String>>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.tracknumber.is_none() && self.tracks.is_none()
    }
}

/// Split the relevant known data of one track into filters.
///
/// A guess for date, tracktotal or tracknumber cannot be fuzzily matched;
/// when that field is itself relevant the guess becomes its filter value
/// and is consumed, turning the query into an exact one.
pub fn construct(
    field: Field,
    guess: Option<Guess>,
    release: &Release,
    index: usize,
    relevant: &[Relevant],
) -> (PreFilter, PostFilter, Option<Guess>) {
    let mut pre = PreFilter::default();
    let mut post = PostFilter::default();
    let mut guess = guess;

    let known = |f: Field| {
        release
            .tracks
            .get(index)
            .and_then(|t| t.known(f))
            .or_else(|| release.known(f))
            .map(str::to_string)
    };

    for &wanted in relevant {
        match wanted {
            Relevant::Tracks => post.tracks = release.known_titles(),
            Relevant::Field(f) => {
                let value = if f == field
                    && matches!(f, Field::TrackTotal | Field::Date | Field::TrackNumber)
                {
                    guess.take().map(|g| g.text)
                } else {
                    known(f)
                };
                match f {
                    Field::Artist => pre.artist = value,
                    Field::Release => pre.release = value,
                    Field::TrackTotal => pre.tracktotal = value,
                    Field::Title => pre.title = value,
                    Field::Date => post.date = value,
                    Field::TrackNumber => post.tracknumber = value,
                    Field::Genre => {}
                }
            }
        }
    }

    (pre, post, guess)
}
