use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{info, warn};

use crate::pipeline::domain::frame_stage::FrameStage;
use crate::pipeline::domain::session_state::SessionState;
use crate::pipeline::frame_buffer::{Admission, AdmissionPolicy, FrameBuffer};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::session_control::SessionControl;
use crate::shared::constants::DEFAULT_BUFFERED_FRAMES;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_sink::FrameSink;
use crate::video::domain::frame_source::FrameSource;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchedulerConfig {
    /// Fixed frame capacity. When unset it is derived from
    /// `memory_limit_bytes` and the size of the first captured frame.
    pub max_buffered_frames: Option<usize>,
    pub memory_limit_bytes: Option<u64>,
    /// Expected frame count, for progress reporting only.
    pub total_frames: Option<usize>,
    /// `Block` for files and directories, `DropOldest` for live sources.
    pub admission: AdmissionPolicy,
}

/// Counts for one session. `frames_emitted + frames_dropped` equals
/// `frames_captured` once the session has drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub frames_captured: u64,
    pub frames_emitted: u64,
    pub frames_dropped: u64,
    pub faces_swapped: u64,
    pub faces_skipped: u64,
}

#[derive(Default)]
struct Counters {
    captured: AtomicU64,
    emitted: AtomicU64,
    faces_swapped: AtomicU64,
    faces_skipped: AtomicU64,
}

/// Runs a session as three threads joined by bounded hand-offs.
///
/// Layout: `capture → FrameBuffer → inference → channel(1) → output`
///
/// With [`AdmissionPolicy::DropOldest`] capture never blocks on a slow
/// consumer: when the buffer is full the oldest queued frame is evicted (or
/// the new one dropped), so latency stays bounded on live sources. With
/// [`AdmissionPolicy::Block`] capture waits for a slot and every frame is
/// emitted. Inference is a single worker, which keeps output in capture
/// order.
pub struct FrameScheduler {
    config: SchedulerConfig,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Starts a session over an opened source and sink.
    pub fn start(
        &self,
        source: Box<dyn FrameSource>,
        stage: Box<dyn FrameStage>,
        sink: Box<dyn FrameSink>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<RunningSession, SwapError> {
        let control = Arc::new(SessionControl::new());
        control.start()?;

        let capacity = self
            .config
            .max_buffered_frames
            .unwrap_or(DEFAULT_BUFFERED_FRAMES);
        let buffer = Arc::new(FrameBuffer::new(capacity, self.config.admission));
        let counters = Arc::new(Counters::default());
        let auto_size = match self.config.max_buffered_frames {
            Some(_) => None,
            None => Some(self.config.memory_limit_bytes),
        };

        let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);

        let capture = spawn_capture(
            source,
            Arc::clone(&buffer),
            Arc::clone(&control),
            Arc::clone(&counters),
            auto_size,
        );
        let inference = spawn_inference(
            stage,
            logger,
            Arc::clone(&buffer),
            Arc::clone(&control),
            Arc::clone(&counters),
            tx,
            self.config.total_frames,
        );
        let output = spawn_output(
            sink,
            rx,
            Arc::clone(&buffer),
            Arc::clone(&control),
            Arc::clone(&counters),
        );

        info!(
            "Session started ({capacity} frames buffered, {:?} admission)",
            self.config.admission
        );
        Ok(RunningSession {
            control,
            buffer,
            counters,
            capture,
            inference,
            output,
        })
    }

    /// Runs a session until the source is exhausted.
    pub fn run(
        &self,
        source: Box<dyn FrameSource>,
        stage: Box<dyn FrameStage>,
        sink: Box<dyn FrameSink>,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<SessionReport, SwapError> {
        self.start(source, stage, sink, logger)?.join()
    }
}

/// Handle to a running session.
pub struct RunningSession {
    control: Arc<SessionControl>,
    buffer: Arc<FrameBuffer>,
    counters: Arc<Counters>,
    capture: JoinHandle<Result<(), SwapError>>,
    inference: JoinHandle<(Box<dyn PipelineLogger>, Result<(), SwapError>)>,
    output: JoinHandle<(Box<dyn FrameSink>, Result<(), SwapError>)>,
}

impl RunningSession {
    /// Capture stops pulling frames; queued frames still drain.
    pub fn pause(&self) -> Result<(), SwapError> {
        self.control.pause()
    }

    pub fn resume(&self) -> Result<(), SwapError> {
        self.control.resume()
    }

    /// Stops admitting frames. Queued and in-flight frames still reach
    /// the sink.
    pub fn stop(&self) {
        self.control.stop();
        self.buffer.close();
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn control(&self) -> Arc<SessionControl> {
        Arc::clone(&self.control)
    }

    pub fn report(&self) -> SessionReport {
        snapshot(&self.counters, &self.buffer)
    }

    /// Waits for the session to drain, closes the sink and returns the
    /// final counts. The first error raised by any stage wins.
    pub fn join(self) -> Result<SessionReport, SwapError> {
        fn set_if_none(slot: &mut Option<SwapError>, err: SwapError) {
            if slot.is_none() {
                *slot = Some(err);
            }
        }

        let mut first_error = None;

        match self.capture.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => set_if_none(&mut first_error, e),
            Err(_) => set_if_none(&mut first_error, SwapError::Capture("capture thread panicked".into())),
        }
        self.buffer.close();

        let logger = match self.inference.join() {
            Ok((logger, result)) => {
                if let Err(e) = result {
                    set_if_none(&mut first_error, e);
                }
                Some(logger)
            }
            Err(_) => {
                set_if_none(&mut first_error, SwapError::Inference("inference thread panicked".into()));
                None
            }
        };

        match self.output.join() {
            Ok((mut sink, result)) => {
                if let Err(e) = result {
                    set_if_none(&mut first_error, e);
                }
                if let Err(e) = sink.close() {
                    set_if_none(&mut first_error, SwapError::Output(e.to_string()));
                }
            }
            Err(_) => set_if_none(&mut first_error, SwapError::Output("output thread panicked".into())),
        }

        self.control.finish();
        let report = snapshot(&self.counters, &self.buffer);

        if let Some(mut logger) = logger {
            logger.count("frames_dropped", report.frames_dropped);
            logger.count("faces_swapped", report.faces_swapped);
            logger.count("faces_skipped", report.faces_skipped);
            logger.summary();
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    "Session finished: {} captured, {} emitted, {} dropped",
                    report.frames_captured, report.frames_emitted, report.frames_dropped
                );
                Ok(report)
            }
        }
    }
}

fn snapshot(counters: &Counters, buffer: &FrameBuffer) -> SessionReport {
    SessionReport {
        frames_captured: counters.captured.load(Ordering::Relaxed),
        frames_emitted: counters.emitted.load(Ordering::Relaxed),
        frames_dropped: buffer.dropped(),
        faces_swapped: counters.faces_swapped.load(Ordering::Relaxed),
        faces_skipped: counters.faces_skipped.load(Ordering::Relaxed),
    }
}

/// `auto_size` is `Some(memory ceiling)` when capacity should follow the
/// first frame's size.
fn spawn_capture(
    mut source: Box<dyn FrameSource>,
    buffer: Arc<FrameBuffer>,
    control: Arc<SessionControl>,
    counters: Arc<Counters>,
    auto_size: Option<Option<u64>>,
) -> JoinHandle<Result<(), SwapError>> {
    std::thread::spawn(move || {
        let result = capture_loop(source.as_mut(), &buffer, &control, &counters, auto_size);
        buffer.close();
        source.close();
        if result.is_err() {
            control.stop();
        }
        result
    })
}

fn capture_loop(
    source: &mut dyn FrameSource,
    buffer: &FrameBuffer,
    control: &SessionControl,
    counters: &Counters,
    mut auto_size: Option<Option<u64>>,
) -> Result<(), SwapError> {
    let mut last_sequence: Option<u64> = None;
    let mut frames = source.frames();

    loop {
        if control.wait_while_paused().is_winding_down() {
            break;
        }
        let Some(next) = frames.next() else {
            break;
        };
        let frame = next.map_err(|e| SwapError::Capture(e.to_string()))?;

        let sequence = frame.sequence();
        if let Some(prev) = last_sequence {
            if sequence <= prev {
                return Err(SwapError::Capture(format!(
                    "frame sequence went from {prev} to {sequence}"
                )));
            }
        }
        last_sequence = Some(sequence);

        if let Some(limit) = auto_size.take() {
            let capacity = FrameBuffer::capacity_for(limit, frame.byte_len());
            buffer.resize(capacity);
            info!(
                "Frame buffer holds {capacity} frames of {}x{}",
                frame.width(),
                frame.height()
            );
        }

        match buffer.push(frame) {
            Ok(Admission::Queued) => {}
            Ok(Admission::EvictedOldest(evicted)) => {
                warn!("Dropped frame {evicted}: frame buffer full");
            }
            Err(SwapError::MemoryBudgetExceeded { capacity, .. }) => {
                warn!("Dropped frame {sequence}: all {capacity} frames in flight");
            }
            Err(SwapError::StopRequested) => break,
            Err(e) => return Err(e),
        }
        counters.captured.fetch_add(1, Ordering::Relaxed);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_inference(
    mut stage: Box<dyn FrameStage>,
    mut logger: Box<dyn PipelineLogger>,
    buffer: Arc<FrameBuffer>,
    control: Arc<SessionControl>,
    counters: Arc<Counters>,
    tx: crossbeam_channel::Sender<Frame>,
    total_frames: Option<usize>,
) -> JoinHandle<(Box<dyn PipelineLogger>, Result<(), SwapError>)> {
    std::thread::spawn(move || {
        while let Some(frame) = buffer.pop() {
            let outcome = match stage.process(&frame, logger.as_mut()) {
                Ok(outcome) => outcome,
                Err(e) => {
                    buffer.release();
                    control.stop();
                    buffer.close();
                    return (logger, Err(e));
                }
            };
            counters
                .faces_swapped
                .fetch_add(outcome.faces_swapped as u64, Ordering::Relaxed);
            counters
                .faces_skipped
                .fetch_add(outcome.faces_skipped as u64, Ordering::Relaxed);

            if tx.send(outcome.frame).is_err() {
                // Output ended early; its own error is reported by join.
                buffer.release();
                control.stop();
                buffer.close();
                break;
            }
            let processed = control.frame_processed();
            logger.progress(processed as usize, total_frames);
        }
        (logger, Ok(()))
    })
}

fn spawn_output(
    mut sink: Box<dyn FrameSink>,
    rx: crossbeam_channel::Receiver<Frame>,
    buffer: Arc<FrameBuffer>,
    control: Arc<SessionControl>,
    counters: Arc<Counters>,
) -> JoinHandle<(Box<dyn FrameSink>, Result<(), SwapError>)> {
    std::thread::spawn(move || {
        for frame in rx {
            let written = sink.write(&frame);
            buffer.release();
            if let Err(e) = written {
                control.stop();
                buffer.close();
                return (sink, Err(SwapError::Output(e.to_string())));
            }
            counters.emitted.fetch_add(1, Ordering::Relaxed);
        }
        (sink, Ok(()))
    })
}
