//! Writing resolved values back: tags first, then file names.

use std::collections::HashSet;
use std::path::PathBuf;

use super::ResolveError;
use crate::control::{Checkpoint, RunContext};
use crate::metadata::TagStore;
use crate::model::{Field, Release, Track};
use crate::text::translate_for_filename;

/// `"<tracknumber> - <title>.<ext>"` next to the current file.
pub fn target_path(track: &Track) -> PathBuf {
    let number = track.known(Field::TrackNumber).unwrap_or_default();
    let title = track.known(Field::Title).unwrap_or_default();
    let mut name = translate_for_filename(&format!("{} - {}", number, title));
    let ext = track.extension();
    if !ext.is_empty() {
        name.push('.');
        name.push_str(&ext);
    }
    track.path.with_file_name(name)
}

/// One planned rename, staged through a temporary name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub temporary: PathBuf,
    pub to: PathBuf,
}

/// Renames for every track, failing if any would overwrite another file.
///
/// Temporary names are picked so that they clash with nothing on disk and
/// nothing else in the plan.
pub fn plan(release: &Release) -> Result<Vec<Rename>, ResolveError> {
    let sources: HashSet<&PathBuf> = release.tracks.iter().map(|t| &t.path).collect();
    let mut taken = HashSet::new();
    let mut targets = Vec::with_capacity(release.tracks.len());

    for track in &release.tracks {
        let target = target_path(track);
        let collision = !taken.insert(target.clone())
            || (target != track.path && target.exists() && !sources.contains(&target));
        if collision {
            return Err(ResolveError::RenameCollision {
                from: track.path.clone(),
                to: target,
            });
        }
        targets.push(target);
    }

    let mut serial = 0;
    let mut renames = Vec::new();
    for (track, target) in release.tracks.iter().zip(targets) {
        if track.path == target {
            continue;
        }
        let temporary = loop {
            let candidate = track.path.with_file_name(format!(".tag-sleuth-{}.tmp", serial));
            serial += 1;
            if !candidate.exists() && !taken.contains(&candidate) && !sources.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(temporary.clone());
        renames.push(Rename {
            from: track.path.clone(),
            temporary,
            to: target,
        });
    }
    Ok(renames)
}

/// Rewrite every track's tags, then rename the files.
///
/// Collisions are detected before anything is touched. Once writing has
/// started only a pause is honoured, never a stop. If any step fails, the
/// renames already done are reversed and the tags read at scan time are
/// written back, so the directory is left as it was found.
pub async fn write_release(
    release: &mut Release,
    tags: &dyn TagStore,
    ctx: &RunContext,
) -> Result<(), ResolveError> {
    let renames = plan(release)?;
    ctx.checkpoint(Checkpoint::Step).await?;

    for (index, track) in release.tracks.iter().enumerate() {
        // Never fails: write-back only waits out a pause
        let _ = ctx.checkpoint(Checkpoint::PauseOnly).await;
        if let Err(e) = tags.rewrite(&track.path, &track.metadata) {
            restore_tags(&release.tracks[..index], tags);
            return Err(ResolveError::Tags(e));
        }
    }

    if let Err(e) = rename_all(&renames) {
        restore_tags(&release.tracks, tags);
        return Err(e.into());
    }

    for track in &mut release.tracks {
        if let Some(rename) = renames.iter().find(|r| r.from == track.path) {
            track.path = rename.to.clone();
        }
    }
    Ok(())
}

/// Both rename phases; on failure every completed rename is undone.
fn rename_all(renames: &[Rename]) -> std::io::Result<()> {
    for (done, rename) in renames.iter().enumerate() {
        if let Err(e) = std::fs::rename(&rename.from, &rename.temporary) {
            undo(renames[..done].iter().map(|r| (&r.temporary, &r.from)));
            return Err(e);
        }
    }

    for (done, rename) in renames.iter().enumerate() {
        if let Err(e) = std::fs::rename(&rename.temporary, &rename.to) {
            undo(renames[..done].iter().map(|r| (&r.to, &r.temporary)));
            undo(renames.iter().map(|r| (&r.temporary, &r.from)));
            return Err(e);
        }
        tracing::debug!("Renamed to {}", rename.to.display());
    }
    Ok(())
}

fn undo<'a>(moves: impl Iterator<Item = (&'a PathBuf, &'a PathBuf)>) {
    for (from, to) in moves {
        if let Err(e) = std::fs::rename(from, to) {
            tracing::error!(
                "Could not move {} back to {}: {}",
                from.display(),
                to.display(),
                e
            );
        }
    }
}

fn restore_tags(tracks: &[Track], tags: &dyn TagStore) {
    for track in tracks {
        if let Err(e) = tags.rewrite(&track.path, &track.tags) {
            tracing::error!("Could not restore tags of {}: {:#}", track.path.display(), e);
        }
    }
}
