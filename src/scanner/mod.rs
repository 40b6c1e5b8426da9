//! Finding audio files and the release directories that hold them.

use futures::StreamExt;
use futures::stream::Stream;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::metadata::TagStore;
use crate::model::{Release, Track};

/// Extensions treated as audio (compared case-insensitively).
pub const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "flac", "ogg", "wav", "m4a"];

pub fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Scans the given root directory recursively for audio files.
///
/// Returns a Stream of PathBufs.
pub fn scan(root: PathBuf) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && is_audio(entry.path()) {
                // If the receiver is dropped, stop scanning
                if tx.blocking_send(entry.path().to_path_buf()).is_err() {
                    break;
                }
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}

/// Directories directly containing audio files, deepest first.
///
/// Anything below one of `exclude` (the sorted and rejects trees) is
/// skipped.
pub async fn release_dirs(root: &Path, exclude: &[PathBuf]) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = scan(root.to_path_buf())
        .filter_map(|file| async move { file.parent().map(Path::to_path_buf) })
        .filter(|dir| {
            let excluded = exclude.iter().any(|e| dir.starts_with(e));
            async move { !excluded }
        })
        .collect()
        .await;

    let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
    dirs.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });
    dirs
}

/// Build a release from the audio files directly inside `dir`.
///
/// Unreadable tags are logged and treated as empty.
pub fn load_release(dir: &Path, tags: &dyn TagStore) -> std::io::Result<Release> {
    let mut tracks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_audio(&path) {
            continue;
        }
        let values = match tags.read(&path) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Could not read tags of {}: {:#}", path.display(), e);
                Default::default()
            }
        };
        tracks.push(Track::new(path, values));
    }
    Ok(Release::new(dir, tracks))
}
