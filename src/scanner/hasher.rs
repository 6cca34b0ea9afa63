//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//! The [`Hasher`] reads file content through a fixed-size buffer, so memory use
//! stays constant regardless of file size. Digests are stored as lowercase hex.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::HashError;

/// Raw 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Read buffer size used while streaming file content.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Convert a raw digest to its lowercase hex form (64 characters).
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Streaming content hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher using [`DEFAULT_BUFFER_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Override the read buffer size.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(4096);
        self
    }

    /// Hash the full content of a file.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut hasher = blake3::Hasher::new();
        hasher
            .update_reader(&mut reader)
            .map_err(|e| HashError::from_io(path.to_path_buf(), e))?;
        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash the full content of a file and hex-encode the digest.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be opened or read.
    pub fn full_hash_hex(&self, path: &Path) -> Result<String, HashError> {
        self.full_hash(path).map(|hash| hash_to_hex(&hash))
    }
}
