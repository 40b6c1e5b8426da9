//! Round-robin resolution of a whole release.

use super::finder::FieldFinder;
use super::{ResolveError, sanity, writeback};
use crate::control::{Checkpoint, RunContext};
use crate::matcher::QueryPlanner;
use crate::metadata::TagStore;
use crate::model::{Field, Release};

/// Runs finders until every field is known or no more progress is made.
pub struct ReleaseResolver {
    finders: Vec<FieldFinder>,
}

impl Default for ReleaseResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseResolver {
    pub fn new() -> Self {
        Self::with_finders(FieldFinder::standard())
    }

    pub fn with_finders(finders: Vec<FieldFinder>) -> Self {
        Self { finders }
    }

    /// Determine every field of `release` without writing anything.
    ///
    /// Each round runs every finder still queued. Finders that fail are
    /// queued again; a round in which none of them succeeded ends the
    /// process with the fields still unknown.
    pub async fn determine(
        &self,
        release: &mut Release,
        planner: &QueryPlanner,
        ctx: &RunContext,
    ) -> Result<(), ResolveError> {
        let mut queue: Vec<&FieldFinder> = self.finders.iter().collect();
        let mut round = 1;

        while !queue.is_empty() {
            ctx.checkpoint(Checkpoint::Step).await?;
            tracing::debug!(
                "Round {}: {:?}",
                round,
                queue.iter().map(|f| f.field.as_str()).collect::<Vec<_>>()
            );

            let mut failed = Vec::new();
            for finder in &queue {
                if !finder.run(release, planner, ctx).await? {
                    failed.push(*finder);
                }
            }

            if failed.len() == queue.len() {
                let unresolved: Vec<Field> = failed.iter().map(|f| f.field).collect();
                return Err(ResolveError::UnresolvedFields(unresolved));
            }
            queue = failed;
            round += 1;
        }
        Ok(())
    }

    /// Determine, sanity check and (unless dry running) write back.
    pub async fn resolve(
        &self,
        release: &mut Release,
        planner: &QueryPlanner,
        tags: &dyn TagStore,
        ctx: &RunContext,
    ) -> Result<(), ResolveError> {
        self.determine(release, planner, ctx).await?;
        sanity::check(release)?;
        tracing::info!("All fields resolved and sane");

        if ctx.dry_run {
            tracing::info!("Dry run; leaving files untouched");
            return Ok(());
        }
        writeback::write_release(release, tags, ctx).await
    }
}
