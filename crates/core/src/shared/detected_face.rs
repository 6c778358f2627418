use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::EMBEDDING_DIM;
use crate::shared::embedding::{is_unit_length, l2_normalize};
use crate::shared::error::SwapError;

/// A face found in one frame: where it is, its landmarks and who it is.
///
/// Produced by the face analyser and read-only downstream. The embedding
/// is unit length.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub landmarks: FaceLandmarks,
    pub embedding: Vec<f32>,
    pub score: f32,
}

/// Identity supplied once at session setup.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceIdentity {
    embedding: Vec<f32>,
}

impl SourceIdentity {
    /// Normalizes `embedding`; rejects wrong dimensionality and zero vectors.
    pub fn from_embedding(mut embedding: Vec<f32>) -> Result<Self, SwapError> {
        if embedding.len() != EMBEDDING_DIM {
            return Err(SwapError::InvalidInput(format!(
                "source embedding must have {EMBEDDING_DIM} values, got {}",
                embedding.len()
            )));
        }
        l2_normalize(&mut embedding);
        if !is_unit_length(&embedding) {
            return Err(SwapError::InvalidInput(
                "source embedding has zero length".into(),
            ));
        }
        Ok(Self { embedding })
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_source_identity_is_normalized() {
        let mut raw = vec![0.0; EMBEDDING_DIM];
        raw[0] = 3.0;
        raw[1] = 4.0;
        let identity = SourceIdentity::from_embedding(raw).unwrap();
        assert_relative_eq!(identity.embedding()[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(identity.embedding()[1], 0.8, epsilon = 1e-6);
    }

    #[test]
    fn test_source_identity_rejects_wrong_dimension() {
        assert!(SourceIdentity::from_embedding(vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_source_identity_rejects_zero_vector() {
        assert!(SourceIdentity::from_embedding(vec![0.0; EMBEDDING_DIM]).is_err());
    }
}
