pub mod domain;
pub mod face_swap_engine;
