//! Fixed-dimension voice embedding vectors.
//!
//! Embeddings are produced by an external speaker model and treated here as
//! opaque numeric vectors. They are expected to be unit-normalized so cosine
//! similarity reduces to a dot product, but `cosine` divides by both norms
//! anyway to stay correct for slightly denormalized inputs.

use crate::error::{Result, RollcallError};
use serde::{Deserialize, Serialize};

/// A voice embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap a raw vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Raw component access.
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean length of the vector.
    pub fn l2_norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Return a unit-normalized copy.
    ///
    /// # Errors
    /// Fails on a zero vector, which has no direction to normalize.
    pub fn normalized(&self) -> Result<Self> {
        let norm = self.l2_norm();
        if norm == 0.0 {
            return Err(RollcallError::Embedding {
                message: "cannot normalize a zero vector".to_string(),
            });
        }
        Ok(Self(self.0.iter().map(|v| v / norm).collect()))
    }

    /// Cosine similarity with another embedding of the same dimension.
    ///
    /// Returns 0.0 if either vector is zero-length in magnitude.
    pub fn cosine(&self, other: &Embedding) -> f32 {
        debug_assert_eq!(self.dim(), other.dim());
        let dot: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norms = self.l2_norm() * other.l2_norm();
        if norms == 0.0 { 0.0 } else { dot / norms }
    }

    /// Unit-normalized mean of a set of embeddings.
    ///
    /// This is how a profile's aggregate is derived from its samples: a
    /// simple (unweighted) mean of the per-sample vectors, renormalized.
    ///
    /// # Errors
    /// Fails on an empty slice, mismatched dimensions, or a zero-mean result.
    pub fn mean(embeddings: &[Embedding]) -> Result<Self> {
        let first = embeddings.first().ok_or_else(|| RollcallError::Embedding {
            message: "no embeddings to average".to_string(),
        })?;
        let dim = first.dim();

        let mut sum = vec![0.0f32; dim];
        for emb in embeddings {
            if emb.dim() != dim {
                return Err(RollcallError::InvalidEmbeddingDimension {
                    expected: dim,
                    actual: emb.dim(),
                });
            }
            for (acc, v) in sum.iter_mut().zip(emb.0.iter()) {
                *acc += v;
            }
        }

        let count = embeddings.len() as f32;
        for v in sum.iter_mut() {
            *v /= count;
        }

        Embedding(sum).normalized()
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_dim_and_values() {
        let emb = Embedding::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(emb.dim(), 3);
        assert_eq!(emb.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_normalized_unit_length() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        let unit = emb.normalized().unwrap();
        assert!((unit.l2_norm() - 1.0).abs() < EPS);
        assert!((unit.values()[0] - 0.6).abs() < EPS);
        assert!((unit.values()[1] - 0.8).abs() < EPS);
    }

    #[test]
    fn test_normalized_zero_vector_fails() {
        let emb = Embedding::new(vec![0.0, 0.0]);
        assert!(emb.normalized().is_err());
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let a = Embedding::new(vec![0.5, 0.5, 0.5]);
        assert!((a.cosine(&a) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.cosine(&b).abs() < EPS);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.cosine(&b) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_robust_to_scale() {
        let a = Embedding::new(vec![1.0, 1.0]);
        let b = Embedding::new(vec![10.0, 10.0]);
        assert!((a.cosine(&b) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_mean_of_orthogonal_units() {
        // E1=[1,0], E2=[0,1] -> mean [0.5,0.5] -> normalized ~[0.7071, 0.7071]
        let e1 = Embedding::new(vec![1.0, 0.0]);
        let e2 = Embedding::new(vec![0.0, 1.0]);
        let agg = Embedding::mean(&[e1, e2]).unwrap();
        assert!((agg.values()[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < EPS);
        assert!((agg.values()[1] - std::f32::consts::FRAC_1_SQRT_2).abs() < EPS);
    }

    #[test]
    fn test_mean_single_embedding_is_normalized_self() {
        let emb = Embedding::new(vec![2.0, 0.0]);
        let agg = Embedding::mean(std::slice::from_ref(&emb)).unwrap();
        assert_eq!(agg, emb.normalized().unwrap());
    }

    #[test]
    fn test_mean_empty_fails() {
        assert!(Embedding::mean(&[]).is_err());
    }

    #[test]
    fn test_mean_dimension_mismatch_fails() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        let result = Embedding::mean(&[a, b]);
        assert!(matches!(
            result,
            Err(crate::error::RollcallError::InvalidEmbeddingDimension { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_mean_of_opposed_vectors_fails() {
        // Mean is the zero vector -> no direction
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!(Embedding::mean(&[a, b]).is_err());
    }

    #[test]
    fn test_serde_transparent_round_trip() {
        let emb = Embedding::new(vec![0.25, -0.5]);
        let json = serde_json::to_string(&emb).unwrap();
        assert_eq!(json, "[0.25,-0.5]");
        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, emb);
    }

    #[test]
    fn test_blended_query_matches_blended_aggregate() {
        // Aggregate of [1,0] and [0,1] matched against [0.7, 0.71]
        let agg = Embedding::mean(&[
            Embedding::new(vec![1.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ])
        .unwrap();
        let unknown = Embedding::new(vec![0.7, 0.71]);
        let sim = unknown.cosine(&agg);
        assert!(sim > 0.999, "expected near-perfect similarity, got {sim}");
    }
}
