use std::sync::Arc;

use super::execution_context::ExecutionContext;
use super::inference_session::InferenceSession;
use super::model_kind::ModelKind;
use crate::shared::error::ModelLoadError;

/// Loads a model artifact bound to an execution context.
///
/// Called by the model cache at most once per `(kind, context)` key.
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        kind: ModelKind,
        context: &ExecutionContext,
    ) -> Result<Arc<dyn InferenceSession>, ModelLoadError>;
}
