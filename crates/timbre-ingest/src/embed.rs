//! Feature extraction from raw track content.

use std::fmt::Debug;

use timbre_core::Embedding;

use crate::error::{IngestError, IngestResult};

/// Turns raw content into a fixed-length embedding.
pub trait Embedder: Send + Sync + Debug {
    /// Length of every embedding this embedder produces.
    fn dimension(&self) -> usize;

    /// # Errors
    /// Returns [`IngestError::Embed`] if no features can be extracted.
    fn embed(&self, content: &[u8]) -> IngestResult<Embedding>;
}

/// Deterministic byte-histogram features.
///
/// The 256 byte values are folded into `dimension` buckets and each bucket
/// holds the fraction of bytes that fell into it, so the components of every
/// embedding sum to one.
#[derive(Debug, Clone, Copy)]
pub struct HistogramEmbedder {
    dimension: usize,
}

impl HistogramEmbedder {
    /// # Errors
    /// Returns [`IngestError::Config`] if `dimension` is zero.
    pub fn new(dimension: usize) -> IngestResult<Self> {
        if dimension == 0 {
            return Err(IngestError::Config(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self { dimension })
    }
}

impl Embedder for HistogramEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, content: &[u8]) -> IngestResult<Embedding> {
        if content.is_empty() {
            return Err(IngestError::Embed("content is empty".to_string()));
        }

        let mut counts = vec![0_u64; self.dimension];
        for &byte in content {
            counts[usize::from(byte) % self.dimension] += 1;
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let features = counts
            .into_iter()
            .map(|count| (count as f64 / content.len() as f64) as f32)
            .collect();

        Embedding::new(features).map_err(|e| IngestError::Embed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dimension_is_rejected() {
        assert!(matches!(
            HistogramEmbedder::new(0),
            Err(IngestError::Config(_))
        ));
    }

    #[test]
    fn test_histogram_buckets() {
        let embedder = HistogramEmbedder::new(4).unwrap();
        // 0 and 4 fold into bucket 0; 1 into bucket 1; 7 into bucket 3.
        let embedding = embedder.embed(&[0, 4, 1, 7]).unwrap();
        assert_eq!(embedding.as_slice(), &[0.5, 0.25, 0.0, 0.25]);
    }

    #[test]
    fn test_embedding_has_configured_dimension() {
        let embedder = HistogramEmbedder::new(16).unwrap();
        let embedding = embedder.embed(b"some track content").unwrap();
        assert_eq!(embedding.len(), embedder.dimension());
        let total: f32 = embedding.as_slice().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = HistogramEmbedder::new(8).unwrap();
        assert_eq!(
            embedder.embed(b"abcabc").unwrap(),
            embedder.embed(b"abcabc").unwrap()
        );
    }

    #[test]
    fn test_empty_content_is_transient_failure() {
        let embedder = HistogramEmbedder::new(8).unwrap();
        let err = embedder.embed(&[]).unwrap_err();
        assert!(err.is_transient());
    }
}
