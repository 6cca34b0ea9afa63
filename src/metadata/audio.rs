//! Audio tags and stream properties.

use std::path::Path;

use lofty::file::TaggedFileExt;
use lofty::prelude::{Accessor, AudioFile, ItemKey};
use lofty::probe::Probe;

use super::{file_type_name, MediaExtractor, MetadataError};
use crate::store::MediaMetadata;

/// Extracts attributes of audio files.
#[derive(Debug, Clone, Copy, Default)]
pub struct AudioExtractor;

impl MediaExtractor for AudioExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata, MetadataError> {
        let tags_error = |source| MetadataError::Tags {
            path: path.to_path_buf(),
            source,
        };

        let tagged_file = Probe::open(path)
            .map_err(tags_error)?
            .guess_file_type()
            .map_err(|source| MetadataError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .read()
            .map_err(tags_error)?;

        let mut metadata = MediaMetadata {
            audio_format: Some(file_type_name(tagged_file.file_type())),
            bitrate_kbps: tagged_file
                .properties()
                .audio_bitrate()
                .filter(|kbps| *kbps > 0),
            ..MediaMetadata::default()
        };

        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            log::debug!("No embedded tags: {}", path.display());
            return Ok(metadata);
        };

        metadata.title = tag.title().map(|s| s.to_string());
        metadata.artist = tag.artist().map(|s| s.to_string());
        metadata.album = tag.album().map(|s| s.to_string());
        metadata.album_artist = tag.get_string(&ItemKey::AlbumArtist).map(str::to_string);
        metadata.year = tag.year();
        metadata.track_number = tag.track();

        let genres: Vec<&str> = tag.get_strings(&ItemKey::Genre).collect();
        if !genres.is_empty() {
            metadata.genre = Some(genres.join(", "));
        }

        log::trace!(
            "Read tags: {} | Artist: {} | Album: {} | Title: {}",
            path.display(),
            metadata.artist.as_deref().unwrap_or("-"),
            metadata.album.as_deref().unwrap_or("-"),
            metadata.title.as_deref().unwrap_or("-"),
        );

        Ok(metadata)
    }
}
