pub mod execution_context;
pub mod inference_session;
pub mod model_kind;
pub mod model_loader;
pub mod provider_kind;
pub mod provider_strategy;
