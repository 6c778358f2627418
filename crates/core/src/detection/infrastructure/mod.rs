pub mod onnx_arcface_embedder;
pub mod onnx_yolo_detector;
