//! ONNX Runtime bindings for each [`ProviderKind`].

use std::sync::Once;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    DirectMLExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
    ROCmExecutionProvider, TensorRTExecutionProvider,
};

use crate::inference::domain::provider_kind::ProviderKind;
use crate::inference::domain::provider_strategy::ProviderStrategy;

static ORT_INIT: Once = Once::new();

/// Initialize the process-wide ONNX Runtime environment exactly once.
pub fn init_runtime() {
    ORT_INIT.call_once(|| {
        let _ = ort::init().with_name("faceswap").commit();
        log::debug!("ONNX Runtime environment initialized");
    });
}

/// Availability check backed by ONNX Runtime's provider registry.
pub struct OrtProviderStrategy {
    kind: ProviderKind,
}

impl OrtProviderStrategy {
    pub fn new(kind: ProviderKind) -> Self {
        Self { kind }
    }
}

impl ProviderStrategy for OrtProviderStrategy {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        let available = match self.kind {
            ProviderKind::Cpu => return true,
            ProviderKind::Cuda => CUDAExecutionProvider::default().is_available(),
            ProviderKind::TensorRt => TensorRTExecutionProvider::default().is_available(),
            ProviderKind::Rocm => ROCmExecutionProvider::default().is_available(),
            ProviderKind::CoreMl => CoreMLExecutionProvider::default().is_available(),
            ProviderKind::DirectMl => DirectMLExecutionProvider::default().is_available(),
        };
        available.unwrap_or(false)
    }

    fn honors_memory_limit(&self) -> bool {
        self.kind == ProviderKind::Cuda
    }
}

/// One strategy per known provider.
pub fn ort_strategies() -> Vec<Box<dyn ProviderStrategy>> {
    ProviderKind::ALL
        .iter()
        .map(|&kind| Box::new(OrtProviderStrategy::new(kind)) as Box<dyn ProviderStrategy>)
        .collect()
}

/// Build the ort dispatch for `kind`, applying the memory ceiling where the
/// provider supports one.
pub fn dispatch(kind: ProviderKind, memory_limit_bytes: Option<u64>) -> ExecutionProviderDispatch {
    match kind {
        ProviderKind::Cpu => CPUExecutionProvider::default().build(),
        ProviderKind::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            match memory_limit_bytes {
                Some(limit) => cuda.with_memory_limit(limit as usize).build(),
                None => cuda.build(),
            }
        }
        ProviderKind::TensorRt => TensorRTExecutionProvider::default().build(),
        ProviderKind::Rocm => ROCmExecutionProvider::default().build(),
        ProviderKind::CoreMl => CoreMLExecutionProvider::default().build(),
        ProviderKind::DirectMl => DirectMLExecutionProvider::default().build(),
    }
}
