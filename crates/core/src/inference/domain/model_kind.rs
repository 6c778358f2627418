use std::fmt;

use crate::shared::constants::{
    DETECTOR_MODEL_NAME, ENHANCER_MODEL_NAME, RECOGNIZER_MODEL_NAME, SWAPPER_MODEL_NAME,
};

/// The pre-trained networks the pipeline composes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelKind {
    FaceDetector,
    FaceRecognizer,
    FaceSwapper,
    FaceEnhancer,
}

impl ModelKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::FaceDetector => DETECTOR_MODEL_NAME,
            ModelKind::FaceRecognizer => RECOGNIZER_MODEL_NAME,
            ModelKind::FaceSwapper => SWAPPER_MODEL_NAME,
            ModelKind::FaceEnhancer => ENHANCER_MODEL_NAME,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::FaceDetector => "face detector",
            ModelKind::FaceRecognizer => "face recognizer",
            ModelKind::FaceSwapper => "face swapper",
            ModelKind::FaceEnhancer => "face enhancer",
        };
        f.write_str(name)
    }
}
