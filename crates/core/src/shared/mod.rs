pub mod alignment;
pub mod bounding_box;
pub mod constants;
pub mod detected_face;
pub mod embedding;
pub mod error;
pub mod frame;
pub mod gaussian;
pub mod model_resolver;
pub mod patch;
pub mod video_metadata;
