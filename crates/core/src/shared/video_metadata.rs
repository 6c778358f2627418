use std::path::PathBuf;

/// Properties of a capture stream, as reported by the source.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// 0.0 when unknown (live capture, still images).
    pub fps: f64,
    pub total_frames: Option<usize>,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Frame rate to encode with, falling back to 30 when unknown.
    pub fn output_fps(&self) -> i32 {
        let fps = self.fps.round() as i32;
        if fps <= 0 {
            30
        } else {
            fps
        }
    }
}
