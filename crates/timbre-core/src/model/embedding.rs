use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// A fixed-length feature vector describing one track.
///
/// Construction rejects empty vectors and non-finite components, so every
/// `Embedding` that reaches the store or the index is usable for distance
/// computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Create an embedding from raw components.
    ///
    /// # Errors
    /// Returns [`Error::InvalidEmbedding`] for an empty vector or one that
    /// contains `NaN` or an infinity.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::InvalidEmbedding("embedding is empty".to_string()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidEmbedding(format!(
                "component {pos} is not finite"
            )));
        }
        Ok(Self(values))
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Encode as a little-endian `f32` BLOB.
    #[must_use]
    pub fn to_blob(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() * F32_WIDTH);
        for value in &self.0 {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decode a little-endian `f32` BLOB written by [`Embedding::to_blob`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidData`] when the BLOB length is not a multiple
    /// of four bytes, and [`Error::InvalidEmbedding`] for decoded values that
    /// would not pass [`Embedding::new`].
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() % F32_WIDTH != 0 {
            return Err(Error::InvalidData(format!(
                "embedding blob length {} is not a multiple of {F32_WIDTH}",
                blob.len()
            )));
        }
        let values = blob
            .chunks_exact(F32_WIDTH)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::new(values)
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
