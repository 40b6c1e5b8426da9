//! Filing release directories away once they are done.
//!
//! Accepted releases move into a structured tree:
//! `<sorted>/<genre>/<artist>/<date> - <release>`. Rejected ones keep their
//! relative path under a rejects directory inside the input root.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Field, Release};
use crate::text::translate_for_filename;

/// Genre directory used when no genre is known.
pub const NO_GENRE: &str = "[None]";

/// Where an accepted release belongs.
pub fn accepted_destination(release: &Release, sorted_root: &Path) -> PathBuf {
    let part = |field: Field| translate_for_filename(release.known(field).unwrap_or_default());
    let genre = release
        .known(Field::Genre)
        .filter(|g| !g.trim().is_empty())
        .map(translate_for_filename)
        .unwrap_or_else(|| NO_GENRE.to_string());

    sorted_root
        .join(genre)
        .join(part(Field::Artist))
        .join(format!("{} - {}", part(Field::Date), part(Field::Release)))
}

/// Where a rejected directory goes: same relative path under the rejects dir.
pub fn rejected_destination(dir: &Path, root: &Path, rejects_dir_name: &str) -> PathBuf {
    let relative = dir
        .strip_prefix(root)
        .ok()
        .filter(|r| !r.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .or_else(|| dir.file_name().map(PathBuf::from))
        .unwrap_or_default();
    root.join(rejects_dir_name).join(relative)
}

/// Move the audio directory `source` to `destination`.
///
/// Only files directly inside `source` are moved; subdirectories are other
/// releases and stay where they are. Directories left empty are removed,
/// up to but excluding `root`.
pub fn move_release(source: &Path, destination: &Path, root: &Path) -> Result<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name() {
            let target = destination.join(name);
            if target.exists() {
                bail!("Destination already exists: {:?}", target);
            }
            files.push((path.clone(), target));
        }
    }

    fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create directory: {:?}", destination))?;
    for (from, to) in files {
        move_file(&from, &to)?;
    }

    remove_empty_dirs(source, root)?;
    Ok(destination.to_path_buf())
}

fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if fs::rename(source, destination).is_err() {
        // If rename fails (cross-device), try copy + delete
        fs::copy(source, destination)
            .with_context(|| format!("Failed to copy file to: {:?}", destination))?;
        fs::remove_file(source)
            .with_context(|| format!("Failed to remove source file: {:?}", source))?;
    }
    Ok(())
}

/// Recursively removes empty directories up the tree, stopping at `root`
pub fn remove_empty_dirs(path: &Path, root: &Path) -> Result<()> {
    if path == root || !path.starts_with(root) {
        return Ok(());
    }
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
        if let Some(parent) = path.parent() {
            let _ = remove_empty_dirs(parent, root);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::release_with;
    use tempfile::tempdir;

    #[test]
    fn test_accepted_destination() {
        let mut release = release_with(&["01.flac"]);
        release.store(Field::Artist, "AC/DC");
        release.store(Field::Date, "1980");
        release.store(Field::Release, "Back in Black");

        assert_eq!(
            accepted_destination(&release, Path::new("/sorted")),
            PathBuf::from("/sorted/[None]/AC-DC/1980 - Back in Black")
        );

        release.store(Field::Genre, "Hard Rock");
        assert_eq!(
            accepted_destination(&release, Path::new("/sorted")),
            PathBuf::from("/sorted/Hard Rock/AC-DC/1980 - Back in Black")
        );
    }

    #[test]
    fn test_rejected_destination_keeps_relative_path() {
        assert_eq!(
            rejected_destination(Path::new("/in/a/b"), Path::new("/in"), "rejects"),
            PathBuf::from("/in/rejects/a/b")
        );
        assert_eq!(
            rejected_destination(Path::new("/in"), Path::new("/in"), "rejects"),
            PathBuf::from("/in/rejects/in")
        );
    }

    #[test]
    fn test_move_release_moves_files_and_cleans_up() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("in/album");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("01 - One.flac"), b"fake flac content").unwrap();
        std::fs::write(source.join("cover.jpg"), b"img").unwrap();
        let destination = temp.path().join("sorted/Rock/Artist/2000 - Album");

        let moved = move_release(&source, &destination, temp.path()).unwrap();

        assert_eq!(moved, destination);
        assert_eq!(
            std::fs::read_to_string(destination.join("01 - One.flac")).unwrap(),
            "fake flac content"
        );
        assert!(destination.join("cover.jpg").exists());
        assert!(!source.exists());
        assert!(!temp.path().join("in").exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn test_move_release_keeps_nested_releases() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("album");
        std::fs::create_dir_all(source.join("cd2")).unwrap();
        std::fs::write(source.join("1.mp3"), b"x").unwrap();
        std::fs::write(source.join("cd2/1.mp3"), b"y").unwrap();

        move_release(&source, &temp.path().join("out"), temp.path()).unwrap();
        assert!(source.join("cd2/1.mp3").exists());
    }

    #[test]
    fn test_move_release_merges_into_existing_dir() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("album");
        let destination = temp.path().join("rejects/album");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(destination.join("cd1")).unwrap();
        std::fs::write(source.join("1.mp3"), b"x").unwrap();

        move_release(&source, &destination, temp.path()).unwrap();
        assert!(destination.join("1.mp3").exists());
        assert!(destination.join("cd1").exists());
    }

    #[test]
    fn test_move_release_refuses_occupied_destination() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("album");
        let destination = temp.path().join("out");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(source.join("1.mp3"), b"x").unwrap();
        std::fs::write(destination.join("other.mp3"), b"y").unwrap();
        std::fs::write(destination.join("1.mp3"), b"z").unwrap();

        assert!(move_release(&source, &destination, temp.path()).is_err());
        assert!(source.join("1.mp3").exists());
    }
}
