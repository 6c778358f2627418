pub mod face_enhancer;
