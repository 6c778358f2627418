pub mod face_detector;
pub mod face_embedder;
pub mod face_landmarks;
