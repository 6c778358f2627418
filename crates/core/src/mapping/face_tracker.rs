//! Sticky single-face tracking across frames.

use log::debug;

use crate::shared::detected_face::DetectedFace;
use crate::shared::embedding::{cosine_similarity, l2_normalize};

#[derive(Clone, Debug, PartialEq)]
pub struct TrackingConfig {
    /// Candidates less similar than this to the reference are not followed.
    pub min_similarity: f32,
    pub old_weight: f32,
    pub new_weight: f32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.20,
            old_weight: 0.9,
            new_weight: 0.1,
        }
    }
}

/// Follows one person through a stream by identity.
///
/// The first frame with faces locks onto the most confident one. After
/// that the tracker picks the face most similar to a running reference
/// embedding and blends that face into the reference.
pub struct FaceTracker {
    config: TrackingConfig,
    reference: Option<Vec<f32>>,
}

impl FaceTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    /// Index of the tracked face in `faces`, if it is present.
    pub fn select(&mut self, faces: &[DetectedFace]) -> Option<usize> {
        if self.reference.is_none() {
            let (index, face) = faces
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))?;
            self.reference = Some(face.embedding.clone());
            return Some(index);
        }
        let reference = self.reference.as_mut()?;

        let (index, similarity) = faces
            .iter()
            .enumerate()
            .map(|(i, f)| (i, cosine_similarity(reference.as_slice(), &f.embedding)))
            .fold(None, |best: Option<(usize, f32)>, (i, s)| match best {
                Some((_, bs)) if bs >= s => best,
                _ => Some((i, s)),
            })?;
        if similarity < self.config.min_similarity {
            debug!("Tracked face lost (best similarity {similarity:.2})");
            return None;
        }

        let new = &faces[index].embedding;
        for (r, n) in reference.iter_mut().zip(new) {
            *r = *r * self.config.old_weight + n * self.config.new_weight;
        }
        l2_normalize(reference);
        Some(index)
    }

    pub fn reference(&self) -> Option<&[f32]> {
        self.reference.as_deref()
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }
}
