use std::path::{Path, PathBuf};
use std::sync::Arc;

use ort::session::builder::GraphOptimizationLevel;

use super::ort_providers;
use super::ort_session::OrtSession;
use crate::inference::domain::execution_context::ExecutionContext;
use crate::inference::domain::inference_session::InferenceSession;
use crate::inference::domain::model_kind::ModelKind;
use crate::inference::domain::model_loader::ModelLoader;
use crate::shared::error::ModelLoadError;
use crate::shared::model_resolver;

/// Loads ONNX artifacts from a models directory.
pub struct OrtModelLoader {
    models_dir: PathBuf,
}

impl OrtModelLoader {
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }
}

impl ModelLoader for OrtModelLoader {
    fn load(
        &self,
        kind: ModelKind,
        context: &ExecutionContext,
    ) -> Result<Arc<dyn InferenceSession>, ModelLoadError> {
        let path = model_resolver::resolve(&self.models_dir, kind)?;
        log::info!("Loading {kind} model from {}", path.display());

        let session = build_session(&path, context).map_err(|e| ModelLoadError::Runtime {
            kind,
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Arc::new(OrtSession::new(session)))
    }
}

fn build_session(
    path: &Path,
    context: &ExecutionContext,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let dispatches: Vec<_> = context
        .providers()
        .iter()
        .map(|&kind| ort_providers::dispatch(kind, context.memory_limit_bytes()))
        .collect();

    let session = ort::session::Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(threads)?
        .with_execution_providers(dispatches)?
        .commit_from_file(path)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = OrtModelLoader::new(dir.path().to_path_buf());
        let err = loader
            .load(ModelKind::FaceDetector, &ExecutionContext::cpu())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ModelLoadError::Missing {
                kind: ModelKind::FaceDetector,
                ..
            }
        ));
    }

    #[test]
    fn test_corrupt_artifact_reports_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ModelKind::FaceSwapper.file_name()),
            b"not an onnx graph",
        )
        .unwrap();
        let loader = OrtModelLoader::new(dir.path().to_path_buf());
        let err = loader
            .load(ModelKind::FaceSwapper, &ExecutionContext::cpu())
            .err()
            .unwrap();
        assert!(matches!(err, ModelLoadError::Runtime { .. }));
    }
}
