use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Consumes processed frames so the pipeline can emit output without
/// depending on a specific codec library.
pub trait FrameSink: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
