use std::path::Path;

use crate::pipeline::domain::frame_stage::{FrameOutcome, FrameStage};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Single-image swap: one frame in, one frame out.
pub struct SwapImageUseCase {
    stage: Box<dyn FrameStage>,
    logger: Box<dyn PipelineLogger>,
}

impl SwapImageUseCase {
    pub fn new(stage: Box<dyn FrameStage>, logger: Box<dyn PipelineLogger>) -> Self {
        Self { stage, logger }
    }

    pub fn swap(&mut self, frame: &Frame) -> Result<FrameOutcome, SwapError> {
        self.stage.process(frame, self.logger.as_mut())
    }

    /// Reads the first frame of `input_path`, swaps it and writes the result.
    pub fn execute(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<FrameOutcome, Box<dyn std::error::Error>> {
        let metadata = source.open(input_path)?;
        let frame = source.frames().next().ok_or("No frames in image")??;
        source.close();

        let outcome = self.swap(&frame)?;
        sink.open(output_path, &metadata)?;
        sink.write(&outcome.frame)?;
        sink.close()?;
        self.logger.summary();

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::video_metadata::VideoMetadata;
    use std::path::PathBuf;

    type BoxError = Box<dyn std::error::Error>;

    struct StubImageSource {
        frame: Option<Frame>,
    }

    impl FrameSource for StubImageSource {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, BoxError> {
            Ok(VideoMetadata {
                width: 4,
                height: 4,
                fps: 0.0,
                total_frames: Some(1),
                source_path: None,
            })
        }

        fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
            Box::new(self.frame.take().into_iter().map(Ok))
        }

        fn close(&mut self) {}
    }

    #[derive(Default)]
    struct StubImageSink {
        written: Vec<(PathBuf, Frame)>,
        path: Option<PathBuf>,
    }

    impl FrameSink for StubImageSink {
        fn open(&mut self, path: &Path, _metadata: &VideoMetadata) -> Result<(), BoxError> {
            self.path = Some(path.to_path_buf());
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
            let path = self.path.clone().ok_or("sink not opened")?;
            self.written.push((path, frame.clone()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    struct InvertStage;

    impl FrameStage for InvertStage {
        fn process(
            &mut self,
            frame: &Frame,
            _logger: &mut dyn PipelineLogger,
        ) -> Result<FrameOutcome, SwapError> {
            let inverted = frame.data().iter().map(|&b| 255 - b).collect();
            Ok(FrameOutcome {
                frame: frame.with_data(inverted),
                faces_swapped: 1,
                faces_skipped: 0,
            })
        }
    }

    fn use_case() -> SwapImageUseCase {
        SwapImageUseCase::new(Box::new(InvertStage), Box::new(NullPipelineLogger))
    }

    #[test]
    fn test_swap_returns_new_frame_with_same_sequence() {
        let frame = Frame::filled(4, 4, [10, 20, 30], 12);
        let outcome = use_case().swap(&frame).unwrap();
        assert_eq!(outcome.frame.sequence(), 12);
        assert_eq!(outcome.frame.pixel(0, 0), [245, 235, 225]);
        assert_eq!(frame.pixel(0, 0), [10, 20, 30]);
    }

    #[test]
    fn test_execute_writes_single_frame() {
        let mut source = StubImageSource {
            frame: Some(Frame::filled(4, 4, [0, 0, 0], 0)),
        };
        let mut sink = StubImageSink::default();

        let outcome = use_case()
            .execute(&mut source, &mut sink, Path::new("in.png"), Path::new("out.png"))
            .unwrap();

        assert_eq!(outcome.faces_swapped, 1);
        assert_eq!(sink.written.len(), 1);
        assert_eq!(sink.written[0].0, PathBuf::from("out.png"));
        assert_eq!(sink.written[0].1.pixel(3, 3), [255, 255, 255]);
    }

    #[test]
    fn test_empty_image_source_errors() {
        let mut source = StubImageSource { frame: None };
        let mut sink = StubImageSink::default();
        let err = use_case()
            .execute(&mut source, &mut sink, Path::new("in.png"), Path::new("out.png"))
            .unwrap_err();
        assert_eq!(err.to_string(), "No frames in image");
        assert!(sink.written.is_empty());
    }
}
