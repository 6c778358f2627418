use std::time::Instant;

use log::debug;

use crate::compositing::compositor::Compositor;
use crate::detection::face_analyser::FaceAnalyser;
use crate::enhancement::domain::face_enhancer::FaceEnhancer;
use crate::mapping::face_mapper::FaceMapper;
use crate::pipeline::domain::frame_stage::{FrameOutcome, FrameStage};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::detected_face::{DetectedFace, SourceIdentity};
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;
use crate::shared::patch::SwapResult;
use crate::swapping::face_swap_engine::FaceSwapEngine;

/// Analyse, map, swap, enhance and composite one frame.
///
/// Mapped faces are swapped on scoped threads and joined before
/// compositing, so a frame never leaves with a partial set of patches.
pub struct FrameProcessor {
    analyser: FaceAnalyser,
    mapper: FaceMapper,
    engine: FaceSwapEngine,
    enhancer: Option<Box<dyn FaceEnhancer>>,
    compositor: Compositor,
}

impl FrameProcessor {
    pub fn new(
        analyser: FaceAnalyser,
        mapper: FaceMapper,
        engine: FaceSwapEngine,
        enhancer: Option<Box<dyn FaceEnhancer>>,
        compositor: Compositor,
    ) -> Self {
        Self {
            analyser,
            mapper,
            engine,
            enhancer,
            compositor,
        }
    }

    pub fn swap_frame(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FrameOutcome, SwapError> {
        let t0 = Instant::now();
        let faces = self.analyser.detect(frame)?;
        let mapping = self.mapper.map(&faces);
        logger.timing("analyse", elapsed_ms(t0));
        logger.metric("faces_per_frame", faces.len() as f64);

        if mapping.is_empty() {
            return Ok(FrameOutcome::passthrough(frame.clone()));
        }

        let t1 = Instant::now();
        let engine = &self.engine;
        let enhancer = self.enhancer.as_deref();
        let sources = self.mapper.sources();
        let swap_one = |&(target, source): &(usize, usize)| {
            swap_face(engine, enhancer, &faces[target], &sources[source], frame)
        };
        let swap_one = &swap_one;

        let swapped: Vec<Result<Option<(DetectedFace, SwapResult)>, SwapError>> =
            if mapping.len() == 1 {
                mapping.pairs().iter().map(swap_one).collect()
            } else {
                std::thread::scope(|scope| {
                    let workers: Vec<_> = mapping
                        .pairs()
                        .iter()
                        .map(|pair| scope.spawn(move || swap_one(pair)))
                        .collect();
                    workers
                        .into_iter()
                        .map(|worker| {
                            worker.join().unwrap_or_else(|_| {
                                Err(SwapError::Inference("face worker panicked".into()))
                            })
                        })
                        .collect()
                })
            };
        logger.timing("swap", elapsed_ms(t1));

        let mut results = Vec::with_capacity(swapped.len());
        let mut skipped = 0;
        for outcome in swapped {
            match outcome? {
                Some(result) => results.push(result),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("Frame {}: skipped {skipped} face(s)", frame.sequence());
        }

        let t2 = Instant::now();
        let composited = self.compositor.composite(frame, &results)?;
        logger.timing("composite", elapsed_ms(t2));

        Ok(FrameOutcome {
            frame: composited,
            faces_swapped: results.len(),
            faces_skipped: skipped,
        })
    }
}

impl FrameStage for FrameProcessor {
    fn process(
        &mut self,
        frame: &Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<FrameOutcome, SwapError> {
        self.swap_frame(frame, logger)
    }
}

fn swap_face(
    engine: &FaceSwapEngine,
    enhancer: Option<&dyn FaceEnhancer>,
    face: &DetectedFace,
    source: &SourceIdentity,
    frame: &Frame,
) -> Result<Option<(DetectedFace, SwapResult)>, SwapError> {
    let Some(result) = engine.swap(face, source.embedding(), frame)? else {
        return Ok(None);
    };
    let result = match enhancer {
        Some(enhancer) => {
            let enhanced = enhancer.enhance(result.patch())?;
            result.with_patch(enhanced)?
        }
        None => result,
    };
    Ok(Some((face.clone(), result)))
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositing::compositor::CompositorConfig;
    use crate::detection::domain::face_detector::{FaceDetector, RawFace};
    use crate::detection::domain::face_embedder::FaceEmbedder;
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::detection::face_analyser::AnalyserConfig;
    use crate::inference::domain::execution_context::ExecutionContext;
    use crate::inference::domain::inference_session::{InferenceSession, ModelHandle};
    use crate::inference::domain::model_kind::ModelKind;
    use crate::mapping::face_mapper::{MappingConfig, TargetSelection};
    use crate::pipeline::pipeline_logger::StdoutPipelineLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::constants::EMBEDDING_DIM;
    use crate::shared::patch::Patch;
    use crate::swapping::face_swap_engine::SwapConfig;
    use ndarray::{ArrayD, IxDyn};
    use std::sync::Arc;

    struct StubDetector(Vec<RawFace>);

    impl FaceDetector for StubDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<RawFace>, SwapError> {
            Ok(self.0.clone())
        }
    }

    struct StubEmbedder;

    impl FaceEmbedder for StubEmbedder {
        fn embed(&self, _frame: &Frame, _landmarks: &FaceLandmarks) -> Result<Vec<f32>, SwapError> {
            let mut e = vec![0.0; EMBEDDING_DIM];
            e[0] = 1.0;
            Ok(e)
        }
    }

    struct WhiteSwapper;

    impl InferenceSession for WhiteSwapper {
        fn run(&self, _inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
            Ok(vec![ArrayD::from_elem(IxDyn(&[1, 3, 128, 128]), 1.0)])
        }
    }

    struct FailingSwapper;

    impl InferenceSession for FailingSwapper {
        fn run(&self, _inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
            Err(SwapError::Inference("device lost".into()))
        }
    }

    struct GreenEnhancer;

    impl FaceEnhancer for GreenEnhancer {
        fn enhance(&self, patch: &Patch) -> Result<Patch, SwapError> {
            Ok(Patch::filled(patch.width(), patch.height(), [0, 255, 0]))
        }
    }

    fn raw(cx: f32, cy: f32) -> RawFace {
        RawFace {
            bbox: BoundingBox::new(cx - 40.0, cy - 50.0, cx + 40.0, cy + 50.0),
            landmarks: FaceLandmarks::new([
                (cx - 18.0, cy - 10.0),
                (cx + 18.0, cy - 10.0),
                (cx, cy + 8.0),
                (cx - 14.0, cy + 28.0),
                (cx + 14.0, cy + 28.0),
            ]),
            score: 0.9,
        }
    }

    /// A face whose landmarks collapse onto one point.
    fn collapsed(cx: f32, cy: f32) -> RawFace {
        RawFace {
            landmarks: FaceLandmarks::new([(cx, cy); 5]),
            ..raw(cx, cy)
        }
    }

    fn processor(
        faces: Vec<RawFace>,
        swapper: Arc<dyn InferenceSession>,
        enhancer: Option<Box<dyn FaceEnhancer>>,
    ) -> FrameProcessor {
        let analyser = FaceAnalyser::new(
            Box::new(StubDetector(faces)),
            Box::new(StubEmbedder),
            AnalyserConfig::default(),
        );
        let mut source = vec![0.0; EMBEDDING_DIM];
        source[1] = 1.0;
        let mapper = FaceMapper::new(
            MappingConfig {
                selection: TargetSelection::All,
                ..MappingConfig::default()
            },
            vec![SourceIdentity::from_embedding(source).unwrap()],
        )
        .unwrap();
        let handle = ModelHandle::new(ModelKind::FaceSwapper, ExecutionContext::cpu().id(), swapper);
        let engine = FaceSwapEngine::new(handle, &SwapConfig::default());
        let compositor = Compositor::new(CompositorConfig {
            color_match: false,
            ..CompositorConfig::default()
        });
        FrameProcessor::new(analyser, mapper, engine, enhancer, compositor)
    }

    #[test]
    fn test_no_faces_passes_frame_through() {
        let mut p = processor(Vec::new(), Arc::new(WhiteSwapper), None);
        let frame = Frame::filled(320, 240, [10, 20, 30], 4);
        let outcome = p.swap_frame(&frame, &mut StdoutPipelineLogger::new(10)).unwrap();
        assert_eq!(outcome, FrameOutcome::passthrough(frame));
    }

    #[test]
    fn test_every_mapped_face_is_swapped() {
        let mut p = processor(
            vec![raw(230.0, 120.0), raw(90.0, 120.0)],
            Arc::new(WhiteSwapper),
            None,
        );
        let frame = Frame::filled(320, 240, [0, 0, 0], 9);
        let mut logger = StdoutPipelineLogger::new(10);
        let outcome = p.swap_frame(&frame, &mut logger).unwrap();

        assert_eq!(outcome.faces_swapped, 2);
        assert_eq!(outcome.faces_skipped, 0);
        assert_eq!(outcome.frame.sequence(), 9);
        assert!(outcome.frame.pixel(90, 128)[0] > 200);
        assert!(outcome.frame.pixel(230, 128)[0] > 200);
        assert_eq!(outcome.frame.pixel(0, 0), [0, 0, 0]);
        assert_eq!(outcome.frame.pixel(319, 239), [0, 0, 0]);
        assert_eq!(logger.timings_for("swap").unwrap().len(), 1);
    }

    #[test]
    fn test_degenerate_face_is_skipped_not_fatal() {
        let mut p = processor(
            vec![collapsed(60.0, 120.0), raw(200.0, 120.0)],
            Arc::new(WhiteSwapper),
            None,
        );
        let frame = Frame::filled(320, 240, [0, 0, 0], 0);
        let outcome = p.swap_frame(&frame, &mut StdoutPipelineLogger::new(10)).unwrap();

        assert_eq!(outcome.faces_swapped, 1);
        assert_eq!(outcome.faces_skipped, 1);
        assert_eq!(outcome.frame.pixel(60, 120), [0, 0, 0]);
        assert!(outcome.frame.pixel(200, 128)[0] > 200);
    }

    #[test]
    fn test_enhancer_output_is_composited() {
        let mut p = processor(
            vec![raw(160.0, 120.0)],
            Arc::new(WhiteSwapper),
            Some(Box::new(GreenEnhancer)),
        );
        let frame = Frame::filled(320, 240, [0, 0, 0], 0);
        let outcome = p.swap_frame(&frame, &mut StdoutPipelineLogger::new(10)).unwrap();

        let centre = outcome.frame.pixel(160, 128);
        assert_eq!(centre[0], 0);
        assert!(centre[1] > 200);
    }

    #[test]
    fn test_inference_failure_is_returned() {
        let mut p = processor(
            vec![raw(90.0, 120.0), raw(230.0, 120.0)],
            Arc::new(FailingSwapper),
            None,
        );
        let frame = Frame::filled(320, 240, [0, 0, 0], 0);
        let err = p
            .process(&frame, &mut StdoutPipelineLogger::new(10))
            .unwrap_err();
        assert!(matches!(err, SwapError::Inference(_)));
    }
}
