//! ArcFace identity embedder.
//!
//! Aligns the face onto the 112×112 ArcFace template and feeds an NCHW RGB
//! tensor normalized to `(x − 127.5) / 127.5`.
use ndarray::Array4;

use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::inference::domain::inference_session::ModelHandle;
use crate::shared::alignment::{warp_rgb, SimilarityTransform};
use crate::shared::error::SwapError;
use crate::shared::frame::{Frame, CHANNELS};

const ALIGNED_SIZE: u32 = 112;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5;

pub struct OnnxArcfaceEmbedder {
    model: ModelHandle,
}

impl OnnxArcfaceEmbedder {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }
}

impl FaceEmbedder for OnnxArcfaceEmbedder {
    fn embed(&self, frame: &Frame, landmarks: &FaceLandmarks) -> Result<Vec<f32>, SwapError> {
        let transform =
            SimilarityTransform::to_template(landmarks, frame.width(), frame.height(), ALIGNED_SIZE)?;
        let aligned = warp_rgb(
            frame.data(),
            frame.width(),
            frame.height(),
            &transform,
            ALIGNED_SIZE,
        );

        let outputs = self.model.run(vec![to_tensor(&aligned).into_dyn()])?;
        let embedding = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::Inference("recognizer produced no outputs".into()))?;
        Ok(embedding.iter().copied().collect())
    }
}

fn to_tensor(aligned: &[u8]) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * CHANNELS;
            for c in 0..CHANNELS {
                tensor[[0, c, y, x]] = (aligned[offset + c] as f32 - PIXEL_MEAN) / PIXEL_STD;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::domain::execution_context::ExecutionContext;
    use crate::inference::domain::inference_session::InferenceSession;
    use crate::inference::domain::model_kind::ModelKind;
    use approx::assert_relative_eq;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::{Arc, Mutex};

    /// Records the input shape and returns a constant embedding.
    struct Recorder {
        seen: Mutex<Vec<Vec<usize>>>,
    }

    impl InferenceSession for Recorder {
        fn run(&self, inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
            self.seen.lock().unwrap().push(inputs[0].shape().to_vec());
            Ok(vec![ArrayD::from_elem(IxDyn(&[1, 512]), 0.5)])
        }
    }

    fn landmarks() -> FaceLandmarks {
        FaceLandmarks::new([
            (80.0, 90.0),
            (120.0, 90.0),
            (100.0, 110.0),
            (84.0, 130.0),
            (116.0, 130.0),
        ])
    }

    #[test]
    fn test_embed_feeds_aligned_crop() {
        let session = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let handle = ModelHandle::new(
            ModelKind::FaceRecognizer,
            ExecutionContext::cpu().id(),
            session.clone(),
        );
        let embedder = OnnxArcfaceEmbedder::new(handle);
        let frame = Frame::filled(200, 200, [90, 90, 90], 0);

        let embedding = embedder.embed(&frame, &landmarks()).unwrap();
        assert_eq!(embedding.len(), 512);
        assert_eq!(session.seen.lock().unwrap()[0], vec![1, 3, 112, 112]);
    }

    #[test]
    fn test_embed_rejects_landmarks_outside_frame() {
        let handle = ModelHandle::new(
            ModelKind::FaceRecognizer,
            ExecutionContext::cpu().id(),
            Arc::new(Recorder {
                seen: Mutex::new(Vec::new()),
            }),
        );
        let embedder = OnnxArcfaceEmbedder::new(handle);
        let frame = Frame::filled(100, 100, [0, 0, 0], 0);
        let err = embedder.embed(&frame, &landmarks()).unwrap_err();
        assert!(matches!(err, SwapError::DegenerateAlignment(_)));
    }

    #[test]
    fn test_tensor_normalization() {
        let aligned = vec![255u8; 112 * 112 * 3];
        let t = to_tensor(&aligned);
        assert_relative_eq!(t[[0, 0, 0, 0]], 1.0);
        let dark = to_tensor(&vec![0u8; 112 * 112 * 3]);
        assert_relative_eq!(dark[[0, 2, 5, 5]], -1.0);
    }
}
