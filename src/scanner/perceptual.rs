//! Perceptual fingerprints of image content.
//!
//! A fingerprint survives resizing and recompression, so two exports of the
//! same photo that differ byte-wise still share it. It is stored on the file
//! record as the base64 form produced by `image_hasher`.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fingerprint algorithm, selectable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualAlgorithm {
    /// DCT preprocessing with a median threshold
    #[default]
    Phash,
    /// Row gradients
    Dhash,
    /// Mean threshold
    Ahash,
}

impl PerceptualAlgorithm {
    fn hash_config(self) -> HasherConfig {
        match self {
            Self::Phash => HasherConfig::new().hash_alg(HashAlg::Median).preproc_dct(),
            Self::Dhash => HasherConfig::new().hash_alg(HashAlg::Gradient),
            Self::Ahash => HasherConfig::new().hash_alg(HashAlg::Mean),
        }
    }
}

impl std::fmt::Display for PerceptualAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Phash => "pHash",
            Self::Dhash => "dHash",
            Self::Ahash => "aHash",
        })
    }
}

#[derive(Debug, Error)]
pub enum PerceptualError {
    #[error("cannot decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Produces fingerprints with one configured algorithm.
pub struct PerceptualHasher {
    inner: image_hasher::Hasher,
    algorithm: PerceptualAlgorithm,
}

impl std::fmt::Debug for PerceptualHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerceptualHasher")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl PerceptualHasher {
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        Self {
            inner: algorithm.hash_config().to_hasher(),
            algorithm,
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> PerceptualAlgorithm {
        self.algorithm
    }

    /// Fingerprint an image that is already decoded.
    #[must_use]
    pub fn fingerprint_image(&self, image: &DynamicImage) -> String {
        self.inner.hash_image(image).to_base64()
    }

    /// Decode the file at `path` and fingerprint it.
    pub fn fingerprint(&self, path: &Path) -> Result<String, PerceptualError> {
        let image = image::open(path).map_err(|source| PerceptualError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.fingerprint_image(&image))
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::default())
    }
}
