use std::cmp::Ordering;

use log::debug;

use crate::detection::domain::face_detector::{FaceDetector, RawFace};
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::shared::constants::EMBEDDING_DIM;
use crate::shared::detected_face::{DetectedFace, SourceIdentity};
use crate::shared::embedding::l2_normalize;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// Detection tuning for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyserConfig {
    /// Faces scoring below this are excluded.
    pub min_score: f32,
    /// Keep at most this many faces after ordering.
    pub max_faces: Option<usize>,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            min_score: 0.5,
            max_faces: None,
        }
    }
}

/// Finds faces in a frame and attaches a unit identity embedding to each.
pub struct FaceAnalyser {
    detector: Box<dyn FaceDetector>,
    embedder: Box<dyn FaceEmbedder>,
    config: AnalyserConfig,
}

impl FaceAnalyser {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        embedder: Box<dyn FaceEmbedder>,
        config: AnalyserConfig,
    ) -> Self {
        Self {
            detector,
            embedder,
            config,
        }
    }

    /// Faces ordered left to right (x1, then y1, then score).
    ///
    /// Faces whose landmarks cannot be aligned are dropped.
    pub fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, SwapError> {
        let mut raw: Vec<RawFace> = self
            .detector
            .detect(frame)?
            .into_iter()
            .filter(|f| f.score >= self.config.min_score && f.bbox.is_finite())
            .collect();
        raw.sort_by(reading_order);
        if let Some(max) = self.config.max_faces {
            raw.truncate(max);
        }

        let mut faces = Vec::with_capacity(raw.len());
        for face in raw {
            let mut embedding = match self.embedder.embed(frame, &face.landmarks) {
                Ok(e) => e,
                Err(SwapError::DegenerateAlignment(reason)) => {
                    debug!(
                        "Frame {}: dropping face at ({:.0}, {:.0}): {reason}",
                        frame.sequence(),
                        face.bbox.x1,
                        face.bbox.y1
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if embedding.len() != EMBEDDING_DIM {
                return Err(SwapError::Inference(format!(
                    "recognizer returned {} values, expected {EMBEDDING_DIM}",
                    embedding.len()
                )));
            }
            l2_normalize(&mut embedding);
            faces.push(DetectedFace {
                bbox: face.bbox,
                landmarks: face.landmarks,
                embedding,
                score: face.score,
            });
        }
        Ok(faces)
    }

    /// Identity of the most confident face in a source image.
    pub fn source_identity(&self, frame: &Frame) -> Result<SourceIdentity, SwapError> {
        let best = self
            .detect(frame)?
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| SwapError::InvalidInput("no face found in source image".into()))?;
        SourceIdentity::from_embedding(best.embedding)
    }
}

fn reading_order(a: &RawFace, b: &RawFace) -> Ordering {
    a.bbox
        .x1
        .total_cmp(&b.bbox.x1)
        .then(a.bbox.y1.total_cmp(&b.bbox.y1))
        .then(b.score.total_cmp(&a.score))
}
