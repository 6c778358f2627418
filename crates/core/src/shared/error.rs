use std::path::PathBuf;

use thiserror::Error;

use crate::inference::domain::model_kind::ModelKind;
use crate::pipeline::domain::session_state::SessionState;

/// Errors raised by the face-swap pipeline.
///
/// Several variants describe recoverable conditions that the pipeline
/// handles locally (provider fallback, skipped faces, dropped frames, stop
/// requests). They exist so those paths have a typed value to log and match
/// on; only the remaining variants end a session.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("execution provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),

    #[error("degenerate alignment: {0}")]
    DegenerateAlignment(&'static str),

    #[error("frame buffer full: {in_flight} of {capacity} frames already in flight")]
    MemoryBudgetExceeded { capacity: usize, in_flight: usize },

    #[error("pipeline stop requested")]
    StopRequested,

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("output failed: {0}")]
    Output(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to load a model artifact.
///
/// `Clone` so that every caller coalesced onto one load observes the same
/// failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelLoadError {
    #[error("model artifact for {kind} not found at {path}")]
    Missing { kind: ModelKind, path: PathBuf },

    #[error("failed to load {kind} model from {path}: {message}")]
    Runtime {
        kind: ModelKind,
        path: PathBuf,
        message: String,
    },

    #[error("could not determine models directory")]
    NoModelsDir,
}

impl SwapError {
    pub fn inference(err: impl std::fmt::Display) -> Self {
        SwapError::Inference(err.to_string())
    }
}
