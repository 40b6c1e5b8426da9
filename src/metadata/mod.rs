//! Audio file tag reading and writing.
//!
//! Uses the lofty crate for format-independent tag access. Supports MP3,
//! FLAC, OGG, M4A and WAV files.
//!
//! The resolver only ever sees [`TagStore`], so tests can substitute an
//! in-memory store for real audio files.

use anyhow::{Context, Result};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag, TagExt};
use std::path::Path;

use crate::model::{Field, Metadata, TagValues};

/// Reads current tags and replaces them with resolved values.
pub trait TagStore: Send + Sync {
    /// Current tag values; fields without a tag are absent.
    fn read(&self, path: &Path) -> Result<TagValues>;

    /// Remove every tag from the file and write `metadata` instead.
    fn rewrite(&self, path: &Path, metadata: &Metadata) -> Result<()>;
}

/// [`TagStore`] backed by the files themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

impl TagStore for LoftyTags {
    fn read(&self, path: &Path) -> Result<TagValues> {
        // Probe the file to determine format and read tags
        let tagged_file = Probe::open(path)
            .context("Failed to open file for probing")?
            .read()
            .context("Failed to read file metadata")?;

        // Get the primary tag, or fall back to the first available tag
        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            return Ok(TagValues::new());
        };

        let mut values = TagValues::new();
        let mut put = |field: Field, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                values.insert(field, value);
            }
        };
        put(Field::Artist, tag.artist().map(|s| s.to_string()));
        put(Field::Release, tag.album().map(|s| s.to_string()));
        put(Field::Date, tag.year().map(|y| y.to_string()));
        put(Field::TrackTotal, tag.track_total().map(|n| n.to_string()));
        put(Field::Genre, tag.genre().map(|s| s.to_string()));
        put(Field::Title, tag.title().map(|s| s.to_string()));
        put(Field::TrackNumber, tag.track().map(|n| n.to_string()));
        Ok(values)
    }

    fn rewrite(&self, path: &Path, metadata: &Metadata) -> Result<()> {
        let tagged_file = Probe::open(path)
            .context("Failed to open file for writing")?
            .read()
            .context("Failed to read file for tag writing")?;

        // Drop every existing tag, whatever its format
        for existing in tagged_file.tags() {
            existing
                .tag_type()
                .remove_from_path(path)
                .with_context(|| format!("Failed to remove {:?} tag", existing.tag_type()))?;
        }

        let mut tag = Tag::new(tagged_file.primary_tag_type());
        let number = |field: Field| metadata.get(&field).and_then(|v| v.trim().parse::<u32>().ok());

        if let Some(artist) = metadata.get(&Field::Artist) {
            tag.set_artist(artist.clone());
        }
        if let Some(release) = metadata.get(&Field::Release) {
            tag.set_album(release.clone());
        }
        if let Some(year) = number(Field::Date) {
            tag.set_year(year);
        }
        if let Some(total) = number(Field::TrackTotal) {
            tag.set_track_total(total);
        }
        if let Some(genre) = metadata.get(&Field::Genre) {
            tag.set_genre(genre.clone());
        }
        if let Some(title) = metadata.get(&Field::Title) {
            tag.set_title(title.clone());
        }
        if let Some(track) = number(Field::TrackNumber) {
            tag.set_track(track);
        }

        tag.save_to_path(path, WriteOptions::default())
            .context("Failed to write tags to file")?;
        tracing::debug!("Rewrote tags of {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        assert!(LoftyTags.read(file.path()).is_err());
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let path = Path::new("non_existent_file.mp3");
        assert!(LoftyTags.read(path).is_err());
    }

    #[test]
    fn test_rewrite_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "Not an audio file").expect("Failed to write");

        let mut metadata = Metadata::new();
        metadata.insert(Field::Title, "Something".into());
        assert!(LoftyTags.rewrite(file.path(), &metadata).is_err());
    }
}
