pub mod ort_model_loader;
pub mod ort_providers;
pub mod ort_session;
