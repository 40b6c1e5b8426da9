//! Processing every release below an input root.
//!
//! Directories are handled one at a time, deepest first: load, fingerprint,
//! resolve, then file the directory under the sorted tree or under the
//! rejects directory. A stop request is honoured between directories
//! (clean stop) or at the next step inside resolution (stop now).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::control::{Cancelled, Checkpoint, RunContext};
use crate::enrichment::acoustid::AcoustIdClient;
use crate::enrichment::musicbrainz::MusicBrainzClient;
use crate::enrichment::{Fpcalc, Identifier, RetryingClient};
use crate::error::{Error, ResultExt};
use crate::matcher::QueryPlanner;
use crate::metadata::{LoftyTags, TagStore};
use crate::organizer;
use crate::resolve::{ReleaseResolver, ResolveError};
use crate::scanner;

/// Per-run choices, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Root of the sorted tree; `<input>/sorted` if unset
    pub sorted: Option<PathBuf>,
    pub rejects_dir_name: String,
    pub api_key: Option<String>,
    pub fingerprint: bool,
    pub use_cache: bool,
}

/// What happened to one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted { dir: PathBuf, destination: PathBuf },
    Rejected { dir: PathBuf, reason: String },
}

/// Outcomes of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
    /// The run ended on a stop request
    pub stopped: bool,
}

impl RunSummary {
    pub fn accepted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Accepted { .. }))
            .count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match outcome {
                Outcome::Accepted { dir, destination } => {
                    writeln!(f, "  ✓ {} → {}", dir.display(), destination.display())?
                }
                Outcome::Rejected { dir, reason } => {
                    writeln!(f, "  ✗ {}: {}", dir.display(), reason)?
                }
            }
        }
        write!(
            f,
            "{} accepted, {} rejected{}",
            self.accepted(),
            self.rejected(),
            if self.stopped { " (stopped early)" } else { "" }
        )
    }
}

pub struct Pipeline {
    resolver: ReleaseResolver,
    planner: QueryPlanner,
    identifier: Option<Identifier>,
    tags: Arc<dyn TagStore>,
    rejects_dir_name: String,
    sorted: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        planner: QueryPlanner,
        identifier: Option<Identifier>,
        tags: Arc<dyn TagStore>,
        options: &RunOptions,
    ) -> Self {
        Self {
            resolver: ReleaseResolver::new(),
            planner,
            identifier,
            tags,
            rejects_dir_name: if options.rejects_dir_name.is_empty() {
                "rejects".to_string()
            } else {
                options.rejects_dir_name.clone()
            },
            sorted: options.sorted.clone(),
        }
    }

    /// Wire up the real remote clients, cache and tag codec.
    pub async fn from_config(config: &Config, options: &RunOptions) -> crate::error::Result<Self> {
        let cache = Arc::new(if options.use_cache && config.cache.enabled {
            ResultCache::open(&config.cache.resolved_path()).await
        } else {
            ResultCache::in_memory()
        });
        let policy = config.retry.policy();

        let remote = MusicBrainzClient::with_base_url(&config.musicbrainz.base_url)
            .with_context("creating the metadata database client")?
            .min_interval(Duration::from_millis(config.musicbrainz.min_interval_ms))
            .search_limit(config.musicbrainz.search_limit);
        let client = RetryingClient::new(Arc::new(remote), cache.clone(), policy);

        let identifier = match (options.fingerprint, options.api_key.as_deref()) {
            (false, _) => None,
            (true, None) => {
                tracing::warn!("No AcoustID API key; fingerprinting disabled");
                None
            }
            (true, Some(key)) => match Fpcalc::locate() {
                Some(fpcalc) => {
                    let lookup = AcoustIdClient::new(key)
                        .with_context("creating the fingerprint client")?;
                    Some(Identifier::new(fpcalc, Arc::new(lookup), cache.clone(), policy))
                }
                None => {
                    tracing::warn!("fpcalc not found; fingerprinting disabled");
                    None
                }
            },
        };

        Ok(Self::new(
            QueryPlanner::new(Arc::new(client)),
            identifier,
            Arc::new(LoftyTags),
            options,
        ))
    }

    /// Where accepted releases go for input `root`.
    pub fn sorted_root(&self, root: &Path) -> PathBuf {
        self.sorted.clone().unwrap_or_else(|| root.join("sorted"))
    }

    pub fn cache(&self) -> &ResultCache {
        self.planner.client().cache()
    }

    /// Process every release directory below `root`.
    pub async fn run(&self, root: &Path, ctx: &RunContext) -> anyhow::Result<RunSummary> {
        if !root.is_dir() {
            return Err(Error::not_a_directory(root).into());
        }
        let sorted = self.sorted_root(root);
        let rejects = root.join(&self.rejects_dir_name);

        let dirs = scanner::release_dirs(root, &[sorted.clone(), rejects]).await;
        tracing::info!("Found {} release directories under {}", dirs.len(), root.display());

        let mut summary = RunSummary::default();
        for dir in dirs {
            if ctx.checkpoint(Checkpoint::Directory).await.is_err() {
                summary.stopped = true;
                break;
            }

            let span = tracing::info_span!("release", dir = %dir.display());
            let outcome = match self.process(&dir, root, &sorted, ctx).instrument(span.clone()).await {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    summary.stopped = true;
                    break;
                }
                Err(e) => {
                    let _entered = span.enter();
                    self.reject(&dir, root, format!("{:#}", e), ctx.dry_run)
                }
            };
            summary.outcomes.push(outcome);
        }

        let stats = self.cache().stats();
        tracing::info!("Cache: {} hits out of {} calls", stats.hits, stats.calls);
        Ok(summary)
    }

    /// One directory; `None` if the run was stopped part way.
    async fn process(
        &self,
        dir: &Path,
        root: &Path,
        sorted: &Path,
        ctx: &RunContext,
    ) -> anyhow::Result<Option<Outcome>> {
        use anyhow::Context as _;

        let mut release = scanner::load_release(dir, self.tags.as_ref())
            .context(format!("Failed to read {}", dir.display()))?;
        tracing::info!("Resolving {} ({} tracks)", release.label(), release.tracks.len());

        if let Some(identifier) = &self.identifier
            && let Err(Cancelled) = identifier.attach(&mut release, ctx).await
        {
            return Ok(None);
        }

        let result = self
            .resolver
            .resolve(&mut release, &self.planner, self.tags.as_ref(), ctx)
            .await;

        let outcome = match result {
            Ok(()) => {
                let destination = organizer::accepted_destination(&release, sorted);
                if !ctx.dry_run {
                    organizer::move_release(dir, &destination, root)
                        .context(format!("Failed to file into {}", destination.display()))?;
                }
                tracing::info!("Accepted into {}", destination.display());
                Outcome::Accepted {
                    dir: dir.to_path_buf(),
                    destination,
                }
            }
            Err(ResolveError::Cancelled(_)) => return Ok(None),
            Err(e) => self.reject(dir, root, e.to_string(), ctx.dry_run),
        };
        Ok(Some(outcome))
    }

    /// Move `dir` under the rejects directory (unless dry running) and
    /// record why.
    ///
    /// If even that move fails the directory stays where it is.
    fn reject(&self, dir: &Path, root: &Path, reason: String, dry_run: bool) -> Outcome {
        tracing::error!("Rejected: {}", reason);
        if dry_run {
            return Outcome::Rejected {
                dir: dir.to_path_buf(),
                reason,
            };
        }
        let destination = organizer::rejected_destination(dir, root, &self.rejects_dir_name);
        let reason = match organizer::move_release(dir, &destination, root) {
            Ok(_) => reason,
            Err(e) => {
                tracing::error!("Could not move {} to rejects: {:#}", dir.display(), e);
                format!("{}; left in place: {:#}", reason, e)
            }
        };
        Outcome::Rejected {
            dir: dir.to_path_buf(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RunControl;
    use crate::model::{Field, TagValues};
    use crate::test_utils::{MemoryTags, abbey_road, mock_remote, planner_for};
    use tempfile::TempDir;

    fn tags(pairs: &[(Field, &str)]) -> TagValues {
        pairs.iter().map(|(f, v)| (*f, v.to_string())).collect()
    }

    /// Two-track Abbey Road with complete tags, and an untagged directory.
    fn library() -> (TempDir, MemoryTags) {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("incoming/abbey");
        let bad = temp.path().join("incoming/mystery");
        std::fs::create_dir_all(&good).unwrap();
        std::fs::create_dir_all(&bad).unwrap();

        let mut store = MemoryTags::default();
        for (n, title) in [(1, "Come Together"), (2, "Something")] {
            let path = good.join(format!("{:02}.flac", n));
            std::fs::write(&path, b"audio").unwrap();
            let number = n.to_string();
            store = store.with_tags(
                path,
                tags(&[
                    (Field::Artist, "The Beatles"),
                    (Field::Release, "Abbey Road"),
                    (Field::Date, "1969"),
                    (Field::TrackTotal, "2"),
                    (Field::Title, title),
                    (Field::TrackNumber, number.as_str()),
                ]),
            );
        }
        std::fs::write(bad.join("track.mp3"), b"audio").unwrap();
        (temp, store)
    }

    fn pipeline(store: MemoryTags) -> Pipeline {
        let options = RunOptions::default();
        Pipeline::new(planner_for(mock_remote()), None, Arc::new(store), &options)
    }

    #[tokio::test]
    async fn test_accepts_and_rejects() {
        let (temp, store) = library();
        let root = temp.path().join("incoming");
        let ctx = RunContext::new(RunControl::new(), false);

        let summary = pipeline(store).run(&root, &ctx).await.unwrap();

        assert_eq!(summary.accepted(), 1);
        assert_eq!(summary.rejected(), 1);
        assert!(!summary.stopped);

        let filed = root.join("sorted/[None]/The Beatles/1969 - Abbey Road");
        assert!(filed.join("01 - Come Together.flac").exists());
        assert!(filed.join("02 - Something.flac").exists());
        assert!(root.join("rejects/mystery/track.mp3").exists());
        assert!(!root.join("abbey").exists());
    }

    #[tokio::test]
    async fn test_filing_conflict_rejects_only_that_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("incoming");
        let mut store = MemoryTags::default();
        for name in ["a", "b"] {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("1.flac");
            std::fs::write(&path, name).unwrap();
            store = store.with_tags(
                path,
                tags(&[
                    (Field::Artist, "Queen"),
                    (Field::Release, "Dup"),
                    (Field::Date, "1978"),
                    (Field::TrackTotal, "1"),
                    (Field::Title, "Song"),
                    (Field::TrackNumber, "1"),
                ]),
            );
        }
        std::fs::create_dir_all(root.join("c")).unwrap();
        std::fs::write(root.join("c/track.mp3"), b"audio").unwrap();
        let ctx = RunContext::new(RunControl::new(), false);

        let summary = pipeline(store).run(&root, &ctx).await.unwrap();

        assert_eq!(summary.accepted(), 1, "{}", summary);
        assert_eq!(summary.rejected(), 2, "{}", summary);
        match &summary.outcomes[1] {
            Outcome::Rejected { dir, reason } => {
                assert_eq!(dir, &root.join("b"));
                assert!(reason.contains("already exists"), "{}", reason);
            }
            other => panic!("unexpected {:?}", other),
        }
        let filed = root.join("sorted/[None]/Queen/1978 - Dup/01 - Song.flac");
        assert_eq!(std::fs::read(filed).unwrap(), b"a");
        assert_eq!(std::fs::read(root.join("rejects/b/01 - Song.flac")).unwrap(), b"b");
        assert!(root.join("rejects/c/track.mp3").exists());
    }

    #[tokio::test]
    async fn test_dry_run_moves_nothing() {
        let (temp, store) = library();
        let root = temp.path().join("incoming");
        let ctx = RunContext::new(RunControl::new(), true);

        let summary = pipeline(store).run(&root, &ctx).await.unwrap();

        assert_eq!(summary.accepted(), 1);
        assert!(root.join("abbey/01.flac").exists());
        assert!(root.join("mystery/track.mp3").exists());
        assert!(!root.join("sorted").exists());
    }

    #[tokio::test]
    async fn test_clean_stop_before_first_directory() {
        let (temp, store) = library();
        let root = temp.path().join("incoming");
        let control = RunControl::new();
        control.stop_cleanly();

        let summary = pipeline(store)
            .run(&root, &RunContext::new(control, false))
            .await
            .unwrap();

        assert!(summary.stopped);
        assert!(summary.outcomes.is_empty());
        assert!(root.join("abbey/01.flac").exists());
    }

    #[tokio::test]
    async fn test_remote_fills_missing_release() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("in");
        let dir = root.join("Abbey Road");
        std::fs::create_dir_all(&dir).unwrap();
        let mut store = MemoryTags::default();
        for (n, title) in abbey_road().tracks.iter().map(|t| (t.position, t.title.clone())) {
            let path = dir.join(format!("{:02} {}.flac", n, title));
            std::fs::write(&path, b"audio").unwrap();
            store = store.with_tags(path, tags(&[(Field::Artist, "The Beatles")]));
        }
        let pipeline = Pipeline::new(
            planner_for(mock_remote().with_release(abbey_road())),
            None,
            Arc::new(store),
            &RunOptions::default(),
        );

        let summary = pipeline
            .run(&root, &RunContext::new(RunControl::new(), true))
            .await
            .unwrap();

        assert_eq!(summary.accepted(), 1, "{}", summary);
        match &summary.outcomes[0] {
            Outcome::Accepted { destination, .. } => assert_eq!(
                destination,
                &root.join("sorted/[None]/The Beatles/1969 - Abbey Road")
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let ctx = RunContext::new(RunControl::new(), false);
        let result = pipeline(MemoryTags::default())
            .run(Path::new("/definitely/not/here"), &ctx)
            .await;
        assert!(result.is_err());
    }
}
