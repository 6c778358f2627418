pub mod domain;
pub mod execution_provider_manager;
pub mod infrastructure;
pub mod model_cache;
