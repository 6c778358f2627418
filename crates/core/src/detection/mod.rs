pub mod domain;
pub mod face_analyser;
pub mod infrastructure;
