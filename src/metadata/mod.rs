//! Best-effort media metadata extraction.
//!
//! Each [`MediaKind`] has its own [`MediaExtractor`]; the
//! [`MetadataExtractor`] dispatches on the file extension. Extraction never
//! fails the caller: errors are logged and whatever fields could be read are
//! returned.

pub mod audio;
pub mod image;
pub mod video;

use std::path::{Path, PathBuf};

use crate::scanner::{MediaKind, PerceptualAlgorithm};
use crate::store::models::extension_of;
use crate::store::MediaMetadata;

pub use self::audio::AudioExtractor;
pub use self::image::ImageExtractor;
pub use self::video::VideoExtractor;

/// Errors raised by a single extractor.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The file could not be opened.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path of the media file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The container or tags could not be parsed.
    #[error("Failed to read tags from {path}: {source}")]
    Tags {
        /// Path of the media file
        path: PathBuf,
        /// The underlying parser error
        #[source]
        source: lofty::error::LoftyError,
    },
}

/// Extraction capability of one media kind.
pub trait MediaExtractor: Send + Sync {
    /// Extract whatever attributes are available for the file.
    ///
    /// Returned fields are partial; unset fields mean "unknown".
    fn extract(&self, path: &Path) -> Result<MediaMetadata, MetadataError>;
}

/// Dispatches extraction to the extractor of the file's media kind.
pub struct MetadataExtractor {
    image: ImageExtractor,
    video: VideoExtractor,
    audio: AudioExtractor,
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor").finish_non_exhaustive()
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::default())
    }
}

impl MetadataExtractor {
    /// Create an extractor computing image fingerprints with `algorithm`.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        Self {
            image: ImageExtractor::new(algorithm),
            video: VideoExtractor,
            audio: AudioExtractor,
        }
    }

    /// Whether the path has a media extension.
    #[must_use]
    pub fn is_media_file(path: &Path) -> bool {
        media_kind(path).is_some()
    }

    fn extractor_for(&self, kind: MediaKind) -> &dyn MediaExtractor {
        match kind {
            MediaKind::Image => &self.image,
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    /// Extract metadata for a file; non-media files yield nothing.
    ///
    /// Never fails: extractor errors are logged and an empty result is
    /// returned.
    pub fn extract(&self, path: &Path) -> MediaMetadata {
        let Some(kind) = media_kind(path) else {
            return MediaMetadata::default();
        };
        match self.extractor_for(kind).extract(path) {
            Ok(metadata) => metadata,
            Err(e) => {
                log::warn!("Metadata extraction failed: {e}");
                MediaMetadata::default()
            }
        }
    }
}

fn media_kind(path: &Path) -> Option<MediaKind> {
    extension_of(path).and_then(|ext| MediaKind::from_extension(&ext))
}

/// Lowercase name of a lofty file type (`mpeg`, `flac`, `mp4`, ...).
pub(crate) fn file_type_name(file_type: lofty::file::FileType) -> String {
    format!("{file_type:?}").to_lowercase()
}
