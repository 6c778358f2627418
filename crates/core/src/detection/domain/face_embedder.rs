use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// Domain interface for identity extraction.
///
/// Returns a raw embedding; the analyser normalizes it. Landmarks that
/// cannot be aligned yield [`SwapError::DegenerateAlignment`].
pub trait FaceEmbedder: Send + Sync {
    fn embed(&self, frame: &Frame, landmarks: &FaceLandmarks) -> Result<Vec<f32>, SwapError>;
}
