//! Video container metadata: duration and codec.
//!
//! Only the MP4 family (`mp4`, `m4v`, `mov`) has a container parser. Every
//! other video extension (Matroska, WebM, AVI, WMV, FLV, MPEG) is a no-op
//! that returns empty metadata, not an error. Pixel dimensions need a full
//! demuxer and are not extracted for any container.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lofty::config::ParseOptions;
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::mp4::{Mp4Codec, Mp4File};
use lofty::probe::Probe;

use super::{MediaExtractor, MetadataError};
use crate::store::models::extension_of;
use crate::store::MediaMetadata;

/// Extensions whose container the MP4 reader understands.
const PARSED_CONTAINERS: &[&str] = &["mp4", "m4v", "mov"];

/// Extracts attributes of video containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoExtractor;

impl MediaExtractor for VideoExtractor {
    fn extract(&self, path: &Path) -> Result<MediaMetadata, MetadataError> {
        if !has_container_parser(path) {
            log::debug!("No container parser for {}, skipping", path.display());
            return Ok(MediaMetadata::default());
        }

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

        let mut metadata = MediaMetadata::default();

        let seconds = tagged_file.properties().duration().as_secs_f64().round();
        if seconds > 0.0 {
            metadata.duration_secs = Some(seconds as u64);
        }

        if tagged_file.file_type() == FileType::Mp4 {
            metadata.codec = mp4_codec(path);
        }

        Ok(metadata)
    }
}

fn has_container_parser(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| PARSED_CONTAINERS.contains(&ext.as_str()))
}

/// Codec of the first audio track of an MP4-family container.
fn mp4_codec(path: &Path) -> Option<String> {
    let mut reader = BufReader::new(File::open(path).ok()?);
    let mp4 = Mp4File::read_from(&mut reader, ParseOptions::new()).ok()?;
    match mp4.properties().codec() {
        Mp4Codec::Unknown => None,
        codec => Some(format!("{codec:?}").to_lowercase()),
    }
}
