use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::compositing::compositor::{Compositor, CompositorConfig};
use crate::detection::face_analyser::{AnalyserConfig, FaceAnalyser};
use crate::detection::infrastructure::onnx_arcface_embedder::OnnxArcfaceEmbedder;
use crate::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crate::enhancement::domain::face_enhancer::FaceEnhancer;
use crate::enhancement::infrastructure::gfpgan_enhancer::{EnhancerConfig, GfpganEnhancer};
use crate::inference::domain::execution_context::ExecutionContext;
use crate::inference::domain::model_kind::ModelKind;
use crate::inference::execution_provider_manager::ExecutionProviderManager;
use crate::inference::model_cache::ModelCache;
use crate::mapping::face_mapper::{FaceMapper, MappingConfig};
use crate::pipeline::frame_buffer::AdmissionPolicy;
use crate::pipeline::frame_processor::FrameProcessor;
use crate::pipeline::frame_scheduler::SchedulerConfig;
use crate::shared::constants::SWAPPER_PROJECTION_NAME;
use crate::shared::detected_face::SourceIdentity;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;
use crate::shared::model_resolver;
use crate::swapping::face_swap_engine::{FaceSwapEngine, SwapConfig};

/// Everything a swap session is configured with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionConfig {
    /// Accelerator names in preference order; CPU is always appended.
    pub execution_providers: Vec<String>,
    pub memory_limit_mb: Option<u64>,
    pub analyser: AnalyserConfig,
    pub mapping: MappingConfig,
    pub swap: SwapConfig,
    /// `None` disables enhancement.
    pub enhancer: Option<EnhancerConfig>,
    pub compositor: CompositorConfig,
    pub max_buffered_frames: Option<usize>,
}

/// A configured session bound to one execution context.
///
/// Models come from the shared cache, so sessions on the same context
/// reuse each other's loaded networks.
pub struct SwapSession {
    config: SessionConfig,
    context: Arc<ExecutionContext>,
    cache: Arc<ModelCache>,
    models_dir: PathBuf,
}

impl SwapSession {
    pub fn new(
        config: SessionConfig,
        manager: &ExecutionProviderManager,
        cache: Arc<ModelCache>,
        models_dir: PathBuf,
    ) -> Self {
        let context = Arc::new(manager.resolve(&config.execution_providers, config.memory_limit_mb));
        Self {
            config,
            context,
            cache,
            models_dir,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn analyser(&self) -> Result<FaceAnalyser, SwapError> {
        let detector = self.cache.get(ModelKind::FaceDetector, &self.context)?;
        let recognizer = self.cache.get(ModelKind::FaceRecognizer, &self.context)?;
        Ok(FaceAnalyser::new(
            Box::new(OnnxYoloDetector::new(detector)),
            Box::new(OnnxArcfaceEmbedder::new(recognizer)),
            self.config.analyser.clone(),
        ))
    }

    /// One identity per source image: the most confident face in each.
    pub fn source_identities(&self, images: &[Frame]) -> Result<Vec<SourceIdentity>, SwapError> {
        if images.is_empty() {
            return Err(SwapError::InvalidInput("no source image given".into()));
        }
        let analyser = self.analyser()?;
        images
            .iter()
            .map(|image| analyser.source_identity(image))
            .collect()
    }

    pub fn processor(&self, sources: Vec<SourceIdentity>) -> Result<FrameProcessor, SwapError> {
        let analyser = self.analyser()?;
        let mapper = FaceMapper::new(self.config.mapping.clone(), sources)?;
        let engine = self.swap_engine()?;
        let enhancer = match &self.config.enhancer {
            Some(config) => {
                let model = self.cache.get(ModelKind::FaceEnhancer, &self.context)?;
                Some(Box::new(GfpganEnhancer::new(model, config)) as Box<dyn FaceEnhancer>)
            }
            None => None,
        };
        let compositor = Compositor::new(self.config.compositor.clone());
        Ok(FrameProcessor::new(analyser, mapper, engine, enhancer, compositor))
    }

    pub fn scheduler_config(
        &self,
        total_frames: Option<usize>,
        admission: AdmissionPolicy,
    ) -> SchedulerConfig {
        SchedulerConfig {
            max_buffered_frames: self.config.max_buffered_frames,
            memory_limit_bytes: self.context.memory_limit_bytes(),
            total_frames,
            admission,
        }
    }

    fn swap_engine(&self) -> Result<FaceSwapEngine, SwapError> {
        let model = self.cache.get(ModelKind::FaceSwapper, &self.context)?;
        let engine = FaceSwapEngine::new(model, &self.config.swap);
        match model_resolver::resolve_optional(&self.models_dir, SWAPPER_PROJECTION_NAME) {
            Some(path) => engine.with_projection(FaceSwapEngine::load_projection(&path)?),
            None => {
                info!(
                    "No {} in {}; using source embeddings unprojected",
                    SWAPPER_PROJECTION_NAME,
                    self.models_dir.display()
                );
                Ok(engine)
            }
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::inference::domain::inference_session::InferenceSession;
    use crate::inference::domain::model_loader::ModelLoader;
    use crate::inference::domain::provider_kind::ProviderKind;
    use crate::shared::constants::EMBEDDING_DIM;
    use crate::shared::error::ModelLoadError;
    use ndarray::ArrayD;
    use std::fs;
    use tempfile::TempDir;

    struct NullSession;

    impl InferenceSession for NullSession {
        fn run(&self, _inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
            Err(SwapError::Inference("not a real model".into()))
        }
    }

    /// Loads a stub session for every kind except `missing`.
    pub(crate) struct StubLoader {
        pub missing: Option<ModelKind>,
    }

    impl ModelLoader for StubLoader {
        fn load(
            &self,
            kind: ModelKind,
            _context: &ExecutionContext,
        ) -> Result<Arc<dyn InferenceSession>, ModelLoadError> {
            if self.missing == Some(kind) {
                return Err(ModelLoadError::Missing {
                    kind,
                    path: PathBuf::from(kind.file_name()),
                });
            }
            Ok(Arc::new(NullSession))
        }
    }

    fn session(config: SessionConfig, missing: Option<ModelKind>, models_dir: &Path) -> SwapSession {
        let manager = ExecutionProviderManager::new(Vec::new(), Box::new(|| {}));
        let cache = Arc::new(ModelCache::new(Box::new(StubLoader { missing })));
        SwapSession::new(config, &manager, cache, models_dir.to_path_buf())
    }

    fn source() -> Vec<SourceIdentity> {
        let mut e = vec![0.0; EMBEDDING_DIM];
        e[0] = 1.0;
        vec![SourceIdentity::from_embedding(e).unwrap()]
    }

    #[test]
    fn test_processor_loads_three_models_without_enhancer() {
        let tmp = TempDir::new().unwrap();
        let s = session(SessionConfig::default(), None, tmp.path());
        s.processor(source()).unwrap();
        assert_eq!(s.cache().load_count(), 3);
        assert_eq!(s.context().providers(), &[ProviderKind::Cpu]);
    }

    #[test]
    fn test_enhancer_adds_a_model() {
        let tmp = TempDir::new().unwrap();
        let config = SessionConfig {
            enhancer: Some(EnhancerConfig::default()),
            ..SessionConfig::default()
        };
        let s = session(config, None, tmp.path());
        s.processor(source()).unwrap();
        s.processor(source()).unwrap();
        assert_eq!(s.cache().load_count(), 4);
    }

    #[test]
    fn test_missing_model_fails_session_setup() {
        let tmp = TempDir::new().unwrap();
        let s = session(SessionConfig::default(), Some(ModelKind::FaceSwapper), tmp.path());
        let err = s.processor(source()).err().unwrap();
        assert!(matches!(
            err,
            SwapError::ModelLoad(ModelLoadError::Missing {
                kind: ModelKind::FaceSwapper,
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_projection_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(SWAPPER_PROJECTION_NAME), [0u8; 16]).unwrap();
        let s = session(SessionConfig::default(), None, tmp.path());
        assert!(matches!(
            s.processor(source()),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_projection_file_is_loaded() {
        let tmp = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..EMBEDDING_DIM * EMBEDDING_DIM)
            .flat_map(|i| {
                let v = if i % (EMBEDDING_DIM + 1) == 0 { 1.0f32 } else { 0.0 };
                v.to_le_bytes()
            })
            .collect();
        fs::write(tmp.path().join(SWAPPER_PROJECTION_NAME), bytes).unwrap();
        let s = session(SessionConfig::default(), None, tmp.path());
        assert!(s.processor(source()).is_ok());
    }

    #[test]
    fn test_empty_source_list_rejected() {
        let tmp = TempDir::new().unwrap();
        let s = session(SessionConfig::default(), None, tmp.path());
        assert!(matches!(
            s.source_identities(&[]),
            Err(SwapError::InvalidInput(_))
        ));
        assert!(matches!(
            s.processor(Vec::new()),
            Err(SwapError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_scheduler_config_carries_memory_ceiling() {
        let tmp = TempDir::new().unwrap();
        let config = SessionConfig {
            memory_limit_mb: Some(2),
            max_buffered_frames: Some(4),
            ..SessionConfig::default()
        };
        let s = session(config, None, tmp.path());
        let scheduler = s.scheduler_config(Some(100), AdmissionPolicy::Block);
        assert_eq!(scheduler.memory_limit_bytes, Some(2 * 1024 * 1024));
        assert_eq!(scheduler.max_buffered_frames, Some(4));
        assert_eq!(scheduler.total_frames, Some(100));
        assert_eq!(scheduler.admission, AdmissionPolicy::Block);
    }
}
