pub mod face_mapper;
pub mod face_tracker;
