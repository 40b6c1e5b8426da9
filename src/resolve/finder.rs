//! Field finders: one weighted vote per field.
//!
//! A [`FieldFinder`] is plain data: the field it resolves, whether it votes
//! once for the whole release or once per track, and its getters with their
//! weights and requirements. [`FieldFinder::run`] gathers candidates from
//! every getter whose requirements are met and stores the consensus.

use tracing::Instrument;

use super::consensus::{Candidate, consensus};
use super::getters::{self, GuessFrom, Source};
use crate::control::{Checkpoint, Cancelled, RunContext};
use crate::matcher::{QueryPlanner, Relevant};
use crate::model::{Field, Release, Track};

use Field::{Artist, Date, Title, TrackNumber};
use GuessFrom::{FileName, Nothing, Tag, TrackCount};

/// How a finder votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One consensus over every track, stored on the release
    Release,
    /// One consensus per track; committed only if every track succeeds
    Track,
}

/// Known fields a getter needs before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Need {
    Nothing,
    All(&'static [Field]),
    Any(&'static [Field]),
    /// Every field of the first list and at least one of the second
    AllThenAny(&'static [Field], &'static [Field]),
}

impl Need {
    /// Fields that would have to become known, or `None` if satisfied.
    pub fn missing(&self, track: &Track) -> Option<Vec<Field>> {
        let absent = |fields: &[Field]| -> Vec<Field> {
            fields.iter().copied().filter(|f| !track.is_known(*f)).collect()
        };
        let missing = match *self {
            Need::Nothing => Vec::new(),
            Need::All(fields) => absent(fields),
            Need::Any(fields) => {
                if fields.iter().any(|f| track.is_known(*f)) {
                    Vec::new()
                } else {
                    fields.to_vec()
                }
            }
            Need::AllThenAny(all, any) => {
                let mut missing = absent(all);
                if !any.iter().any(|f| track.is_known(*f)) {
                    missing.extend_from_slice(any);
                }
                missing
            }
        };
        if missing.is_empty() { None } else { Some(missing) }
    }
}

/// One weighted candidate source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GetterSpec {
    pub source: Source,
    pub weight: f64,
    pub need: Need,
}

const fn getter(source: Source, weight: f64, need: Need) -> GetterSpec {
    GetterSpec {
        source,
        weight,
        need,
    }
}

const fn remote(guess: GuessFrom, relevant: &'static [Relevant]) -> Source {
    Source::Remote { guess, relevant }
}

const NEEDS_RELEASE: Need = Need::All(&[Field::Release]);
const NEEDS_TITLE: Need = Need::All(&[Title]);
const NEEDS_RELEASE_AND_NUMBER: Need = Need::All(&[Field::Release, TrackNumber]);
const NEEDS_RELEASE_CONTEXT: Need = Need::Any(&[Artist, Date, Title]);

const ARTIST_GETTERS: &[GetterSpec] = &[
    getter(Source::Fingerprint, 3.0, Need::Nothing),
    getter(Source::FingerprintLookup, 3.0, Need::Nothing),
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(remote(Tag, &[]), 3.0, Need::Nothing),
    getter(
        remote(Nothing, &[Relevant::RELEASE, Relevant::DATE, Relevant::TRACKTOTAL, Relevant::TRACKS]),
        2.0,
        NEEDS_RELEASE,
    ),
    getter(
        remote(Tag, &[Relevant::RELEASE, Relevant::DATE, Relevant::TRACKTOTAL]),
        4.0,
        NEEDS_RELEASE,
    ),
    getter(remote(FileName, &[]), 2.0, Need::Nothing),
];

const RELEASE_GETTERS: &[GetterSpec] = &[
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(remote(Tag, &[]), 3.0, Need::Nothing),
    getter(
        remote(Nothing, &[Relevant::ARTIST, Relevant::DATE, Relevant::TRACKS, Relevant::TRACKTOTAL]),
        3.0,
        Need::AllThenAny(&[Artist], &[Date, Title]),
    ),
    getter(
        remote(Tag, &[Relevant::ARTIST, Relevant::DATE, Relevant::TRACKS, Relevant::TRACKTOTAL]),
        4.0,
        NEEDS_RELEASE_CONTEXT,
    ),
    getter(remote(FileName, &[]), 2.0, Need::Nothing),
    getter(
        remote(FileName, &[Relevant::ARTIST, Relevant::DATE, Relevant::TRACKS, Relevant::TRACKTOTAL]),
        3.5,
        NEEDS_RELEASE_CONTEXT,
    ),
];

const DATE_GETTERS: &[GetterSpec] = &[
    getter(Source::Tag, 2.0, Need::Nothing),
    getter(
        remote(Nothing, &[Relevant::RELEASE, Relevant::ARTIST, Relevant::TRACKTOTAL]),
        4.0,
        NEEDS_RELEASE,
    ),
    getter(
        remote(Tag, &[Relevant::RELEASE, Relevant::ARTIST, Relevant::TRACKTOTAL, Relevant::DATE]),
        3.0,
        NEEDS_RELEASE,
    ),
];

const TRACKTOTAL_GETTERS: &[GetterSpec] = &[
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(
        remote(Nothing, &[Relevant::RELEASE, Relevant::ARTIST, Relevant::DATE]),
        3.0,
        NEEDS_RELEASE,
    ),
    getter(
        remote(Tag, &[Relevant::RELEASE, Relevant::ARTIST, Relevant::DATE, Relevant::TRACKTOTAL]),
        4.0,
        NEEDS_RELEASE,
    ),
    getter(Source::TrackCount, 2.0, Need::Nothing),
    getter(
        remote(TrackCount, &[Relevant::RELEASE, Relevant::TRACKTOTAL]),
        6.0,
        NEEDS_RELEASE,
    ),
];

const GENRE_GETTERS: &[GetterSpec] = &[
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(Source::Fingerprint, 1.0, Need::Nothing),
];

const TITLE_GETTERS: &[GetterSpec] = &[
    getter(Source::Fingerprint, 3.0, Need::Nothing),
    getter(Source::FingerprintLookup, 3.0, Need::Nothing),
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(remote(Tag, &[]), 3.0, Need::Nothing),
    getter(
        remote(
            Nothing,
            &[
                Relevant::RELEASE,
                Relevant::TRACKNUMBER,
                Relevant::DATE,
                Relevant::ARTIST,
                Relevant::TRACKTOTAL,
            ],
        ),
        2.0,
        NEEDS_RELEASE_AND_NUMBER,
    ),
    getter(
        remote(Tag, &[Relevant::RELEASE, Relevant::TRACKNUMBER, Relevant::ARTIST]),
        4.0,
        NEEDS_RELEASE_AND_NUMBER,
    ),
    getter(remote(FileName, &[]), 2.0, Need::Nothing),
    getter(
        remote(FileName, &[Relevant::RELEASE, Relevant::TRACKNUMBER, Relevant::ARTIST]),
        3.5,
        NEEDS_RELEASE_AND_NUMBER,
    ),
];

const TRACKNUMBER_GETTERS: &[GetterSpec] = &[
    getter(Source::Tag, 1.0, Need::Nothing),
    getter(
        remote(Nothing, &[Relevant::TITLE, Relevant::ARTIST, Relevant::RELEASE]),
        2.0,
        NEEDS_TITLE,
    ),
    getter(
        remote(
            Tag,
            &[Relevant::TITLE, Relevant::ARTIST, Relevant::RELEASE, Relevant::TRACKNUMBER],
        ),
        3.0,
        NEEDS_TITLE,
    ),
    getter(Source::FileNameDigits, 1.5, Need::Nothing),
];

/// Resolves one field by weighted vote.
#[derive(Debug, Clone)]
pub struct FieldFinder {
    pub field: Field,
    pub mode: Mode,
    /// Report success even when no getter produced anything
    pub optional: bool,
    pub getters: Vec<GetterSpec>,
}

impl FieldFinder {
    /// The stock finder for `field`.
    pub fn for_field(field: Field) -> Self {
        let getters = match field {
            Field::Artist => ARTIST_GETTERS,
            Field::Release => RELEASE_GETTERS,
            Field::Date => DATE_GETTERS,
            Field::TrackTotal => TRACKTOTAL_GETTERS,
            Field::Genre => GENRE_GETTERS,
            Field::Title => TITLE_GETTERS,
            Field::TrackNumber => TRACKNUMBER_GETTERS,
        };
        Self {
            field,
            mode: if field.is_release_scoped() {
                Mode::Release
            } else {
                Mode::Track
            },
            optional: field == Field::Genre,
            getters: getters.to_vec(),
        }
    }

    /// One stock finder per field, in resolution order.
    pub fn standard() -> Vec<Self> {
        Field::ALL.into_iter().map(Self::for_field).collect()
    }

    /// Gather candidates and store the consensus.
    ///
    /// Returns `Ok(false)` if no consensus was reached; in track mode nothing
    /// is stored unless every track reached one.
    pub async fn run(
        &self,
        release: &mut Release,
        planner: &QueryPlanner,
        ctx: &RunContext,
    ) -> Result<bool, Cancelled> {
        let span = tracing::debug_span!("finder", field = %self.field);
        self.run_inner(release, planner, ctx).instrument(span).await
    }

    async fn run_inner(
        &self,
        release: &mut Release,
        planner: &QueryPlanner,
        ctx: &RunContext,
    ) -> Result<bool, Cancelled> {
        let found = match self.mode {
            Mode::Release => {
                let all: Vec<usize> = (0..release.tracks.len()).collect();
                let candidates = self.collect(release, &all, planner, ctx).await?;
                ctx.checkpoint(Checkpoint::Step).await?;
                match consensus(&candidates) {
                    Some(value) => {
                        tracing::info!("{} is {:?}", self.field, value);
                        release.store(self.field, value);
                        true
                    }
                    None => false,
                }
            }
            Mode::Track => {
                let mut winners = Vec::with_capacity(release.tracks.len());
                for index in 0..release.tracks.len() {
                    let candidates = self.collect(release, &[index], planner, ctx).await?;
                    ctx.checkpoint(Checkpoint::Step).await?;
                    match consensus(&candidates) {
                        Some(value) => winners.push(value),
                        None => {
                            tracing::debug!(
                                "No {} for {}",
                                self.field,
                                release.tracks[index].file_name()
                            );
                            break;
                        }
                    }
                }
                if !release.tracks.is_empty() && winners.len() == release.tracks.len() {
                    for (track, value) in release.tracks.iter_mut().zip(winners) {
                        tracing::info!("{} of {} is {:?}", self.field, track.file_name(), value);
                        track.store(self.field, value);
                    }
                    true
                } else {
                    false
                }
            }
        };

        if !found && self.optional {
            tracing::info!("No {} found; leaving it empty", self.field);
            return Ok(true);
        }
        if !found {
            tracing::info!("Unable to determine {}", self.field);
        }
        Ok(found)
    }

    async fn collect(
        &self,
        release: &Release,
        indices: &[usize],
        planner: &QueryPlanner,
        ctx: &RunContext,
    ) -> Result<Vec<Candidate>, Cancelled> {
        let mut candidates = Vec::new();
        for getter in &self.getters {
            for &index in indices {
                ctx.checkpoint(Checkpoint::Step).await?;
                let track = &release.tracks[index];
                if let Some(missing) = getter.need.missing(track) {
                    tracing::debug!(
                        "Skipping {} for {}: {:?} not known yet",
                        getter.source,
                        track.file_name(),
                        missing.iter().map(|f| f.as_str()).collect::<Vec<_>>()
                    );
                    continue;
                }
                let value = getters::fetch(getter.source, self.field, release, index, planner).await;
                tracing::debug!(
                    "{:>5} {:<40} {:<30} {:?}",
                    getter.weight,
                    getter.source.to_string(),
                    track.file_name(),
                    value
                );
                candidates.push(Candidate {
                    value,
                    weight: getter.weight,
                    source: getter.source.to_string(),
                    track: track.file_name(),
                });
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RunControl;
    use crate::model::TagValues;
    use crate::test_utils::{mock_remote, planner_for};

    fn tagged(path: &str, pairs: &[(Field, &str)]) -> Track {
        let tags: TagValues = pairs.iter().map(|(f, v)| (*f, v.to_string())).collect();
        Track::new(path, tags)
    }

    fn ctx() -> RunContext {
        RunContext::new(RunControl::new(), false)
    }

    #[test]
    fn test_need_missing() {
        let mut track = Track::new("/m/1.mp3", TagValues::new());
        assert_eq!(NEEDS_RELEASE.missing(&track), Some(vec![Field::Release]));
        assert_eq!(Need::Nothing.missing(&track), None);

        let need = Need::AllThenAny(&[Artist], &[Date, Title]);
        track.store(Artist, "Queen");
        assert_eq!(need.missing(&track), Some(vec![Date, Title]));
        track.store(Title, "Bicycle Race");
        assert_eq!(need.missing(&track), None);
    }

    #[test]
    fn test_standard_covers_every_field_in_order() {
        let fields: Vec<Field> = FieldFinder::standard().iter().map(|f| f.field).collect();
        assert_eq!(fields, Field::ALL.to_vec());
        assert_eq!(FieldFinder::for_field(Title).mode, Mode::Track);
        assert!(FieldFinder::for_field(Field::Genre).optional);
    }

    #[tokio::test]
    async fn test_release_mode_pools_every_track() {
        let planner = planner_for(mock_remote());
        let mut release = Release::new(
            "/m/a",
            vec![
                tagged("/m/a/1.mp3", &[(Artist, "The Beatles")]),
                tagged("/m/a/2.mp3", &[(Artist, "the beatles")]),
                tagged("/m/a/3.mp3", &[(Artist, "The Beatles")]),
            ],
        );

        let ok = FieldFinder::for_field(Artist)
            .run(&mut release, &planner, &ctx())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(release.known(Artist), Some("The Beatles"));
        assert!(release.tracks.iter().all(|t| t.known(Artist) == Some("The Beatles")));
    }

    #[tokio::test]
    async fn test_track_mode_is_all_or_nothing() {
        let planner = planner_for(mock_remote());
        let finder = FieldFinder {
            field: Title,
            mode: Mode::Track,
            optional: false,
            getters: vec![getter(Source::Tag, 1.0, Need::Nothing)],
        };
        let mut release = Release::new(
            "/m/a",
            vec![
                tagged("/m/a/1.mp3", &[(Title, "One")]),
                tagged("/m/a/2.mp3", &[]),
            ],
        );

        assert!(!finder.run(&mut release, &planner, &ctx()).await.unwrap());
        assert!(release.tracks.iter().all(|t| !t.is_known(Title)));

        release.tracks[1].tags.insert(Title, "Two".into());
        assert!(finder.run(&mut release, &planner, &ctx()).await.unwrap());
        assert_eq!(release.tracks[1].known(Title), Some("Two"));
    }

    #[tokio::test]
    async fn test_all_empty_getters_fail_without_error() {
        let planner = planner_for(mock_remote());
        let mut release = Release::new("/m/a", vec![tagged("/m/a/x.mp3", &[])]);

        let ok = FieldFinder::for_field(Date)
            .run(&mut release, &planner, &ctx())
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(release.known(Date), None);
    }

    #[tokio::test]
    async fn test_optional_genre_succeeds_empty() {
        let planner = planner_for(mock_remote());
        let mut release = Release::new("/m/a", vec![tagged("/m/a/x.mp3", &[])]);

        let ok = FieldFinder::for_field(Field::Genre)
            .run(&mut release, &planner, &ctx())
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(release.known(Field::Genre), None);
    }

    #[tokio::test]
    async fn test_track_count_outweighs_wrong_tag() {
        let planner = planner_for(mock_remote());
        let mut release = Release::new(
            "/m/a",
            vec![
                tagged("/m/a/1.mp3", &[(Field::TrackTotal, "12")]),
                tagged("/m/a/2.mp3", &[]),
            ],
        );

        FieldFinder::for_field(Field::TrackTotal)
            .run(&mut release, &planner, &ctx())
            .await
            .unwrap();
        assert_eq!(release.known(Field::TrackTotal), Some("02"));
    }

    #[tokio::test]
    async fn test_stop_now_cancels_finder() {
        let planner = planner_for(mock_remote());
        let control = RunControl::new();
        control.stop_now();
        let ctx = RunContext::new(control, false);
        let mut release = Release::new("/m/a", vec![tagged("/m/a/1.mp3", &[(Artist, "Queen")])]);

        let result = FieldFinder::for_field(Artist).run(&mut release, &planner, &ctx).await;
        assert_eq!(result, Err(Cancelled));
        assert_eq!(release.known(Artist), None);
    }
}
