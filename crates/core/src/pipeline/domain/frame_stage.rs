use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// What the inference stage produced for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutcome {
    pub frame: Frame,
    pub faces_swapped: usize,
    pub faces_skipped: usize,
}

impl FrameOutcome {
    /// The input frame, unchanged.
    pub fn passthrough(frame: Frame) -> Self {
        Self {
            frame,
            faces_swapped: 0,
            faces_skipped: 0,
        }
    }
}

/// The per-frame work between capture and output.
///
/// An error ends the session.
pub trait FrameStage: Send {
    fn process(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FrameOutcome, SwapError>;
}
