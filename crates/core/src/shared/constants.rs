pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const RECOGNIZER_MODEL_NAME: &str = "w600k_r50.onnx";
pub const SWAPPER_MODEL_NAME: &str = "inswapper_128.onnx";
pub const ENHANCER_MODEL_NAME: &str = "GFPGANv1.4.onnx";

/// Identity projection for the swapper: 512x512 little-endian f32, row-major.
pub const SWAPPER_PROJECTION_NAME: &str = "inswapper_128.emap";

/// Dimensionality of identity embeddings.
pub const EMBEDDING_DIM: usize = 512;

/// Frames in flight when no memory ceiling is configured.
pub const DEFAULT_BUFFERED_FRAMES: usize = 8;

/// Frame buffering may use `1 / FRAME_BUFFER_MEMORY_DIVISOR` of the memory
/// ceiling; the rest belongs to the inference runtime.
pub const FRAME_BUFFER_MEMORY_DIVISOR: u64 = 4;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
