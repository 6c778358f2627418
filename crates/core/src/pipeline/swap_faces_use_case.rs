use std::path::Path;

use crate::pipeline::domain::frame_stage::FrameStage;
use crate::pipeline::frame_scheduler::{FrameScheduler, RunningSession, SchedulerConfig, SessionReport};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

/// Streaming swap: open → schedule (capture → swap → write) → report.
pub struct SwapFacesUseCase {
    source: Box<dyn FrameSource>,
    sink: Box<dyn FrameSink>,
    stage: Box<dyn FrameStage>,
    logger: Box<dyn PipelineLogger>,
    config: SchedulerConfig,
}

impl SwapFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        sink: Box<dyn FrameSink>,
        stage: Box<dyn FrameStage>,
        logger: Box<dyn PipelineLogger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            stage,
            logger,
            config,
        }
    }

    /// Opens both ends and starts the session without waiting for it.
    pub fn start(
        mut self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<RunningSession, Box<dyn std::error::Error>> {
        let metadata = self.source.open(input_path)?;
        self.sink.open(output_path, &metadata)?;

        let mut config = self.config;
        if config.total_frames.is_none() {
            config.total_frames = metadata.total_frames;
        }
        self.logger.info(&format!(
            "Swapping {}x{} stream from {}",
            metadata.width,
            metadata.height,
            input_path.display()
        ));

        let session =
            FrameScheduler::new(config).start(self.source, self.stage, self.sink, self.logger)?;
        Ok(session)
    }

    /// Runs until the source is exhausted.
    pub fn execute(
        self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<SessionReport, Box<dyn std::error::Error>> {
        Ok(self.start(input_path, output_path)?.join()?)
    }
}
