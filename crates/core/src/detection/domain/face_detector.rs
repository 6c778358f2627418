use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// A face location before identity extraction.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFace {
    pub bbox: BoundingBox,
    pub landmarks: FaceLandmarks,
    pub score: f32,
}

/// Domain interface for face localization.
///
/// Stateless per call so one detector can serve every frame of a session.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<RawFace>, SwapError>;
}
