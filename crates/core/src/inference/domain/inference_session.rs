use std::fmt;
use std::sync::Arc;

use ndarray::ArrayD;

use super::execution_context::ContextId;
use super::model_kind::ModelKind;
use crate::shared::error::SwapError;

/// A loaded network that maps f32 input tensors to f32 output tensors.
///
/// Inputs and outputs are positional, in the order the model declares them.
/// Implementations must be callable from several threads; they serialize
/// internally if the runtime requires it.
pub trait InferenceSession: Send + Sync {
    fn run(&self, inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError>;

    /// Declared shape of input `index`; dynamic dimensions are negative.
    fn input_shape(&self, _index: usize) -> Option<Vec<i64>> {
        None
    }
}

/// Shared reference to a loaded model bound to one execution context.
///
/// Cloning is cheap. The model is never mutated after load and is released
/// once the cache and every session have dropped their handles.
#[derive(Clone)]
pub struct ModelHandle {
    kind: ModelKind,
    context: ContextId,
    session: Arc<dyn InferenceSession>,
}

impl ModelHandle {
    pub fn new(kind: ModelKind, context: ContextId, session: Arc<dyn InferenceSession>) -> Self {
        Self {
            kind,
            context,
            session,
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn run(&self, inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
        self.session.run(inputs)
    }

    pub fn input_shape(&self, index: usize) -> Option<Vec<i64>> {
        self.session.input_shape(index)
    }

    /// True when both handles refer to the same loaded model.
    pub fn same_model(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Number of live handles to this model, including this one.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.session)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("kind", &self.kind)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
