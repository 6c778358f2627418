/// YOLO pose face detector running on a cached model handle.
///
/// Handles letterbox preprocessing, output decoding and NMS. The detector
/// keeps no per-frame state; ordering and identity are the analyser's job.
use ndarray::{Array4, IxDyn};

use crate::detection::domain::face_detector::{FaceDetector, RawFace};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::inference::domain::inference_session::ModelHandle;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::SwapError;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model declares a dynamic shape.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Candidates below this never reach NMS; the analyser applies the
/// session's own threshold afterwards.
const CANDIDATE_CONFIDENCE: f32 = 0.25;

const NMS_IOU_THRESH: f32 = 0.45;

/// Box (4) + confidence (1) + five keypoints of (x, y, conf).
const ROW_LEN: usize = 5 + 15;

pub struct OnnxYoloDetector {
    model: ModelHandle,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Reads the square input size from the model's NCHW input shape.
    pub fn new(model: ModelHandle) -> Self {
        let input_size = model
            .input_shape(0)
            .and_then(|shape| {
                if shape.len() >= 4 && shape[2] > 0 {
                    Some(shape[2] as u32)
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);
        Self { model, input_size }
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<RawFace>, SwapError> {
        let (input, scale, pad_x, pad_y) = letterbox(frame, self.input_size);
        let outputs = self.model.run(vec![input.into_dyn()])?;
        let tensor = outputs
            .first()
            .ok_or_else(|| SwapError::Inference("detector produced no outputs".into()))?;
        let shape = tensor.shape();
        if shape.len() != 3 {
            return Err(SwapError::Inference(format!(
                "unexpected detector output shape {shape:?}"
            )));
        }

        // [1, features, detections] (transposed) or [1, detections, features].
        let transposed = if shape[2] == ROW_LEN {
            false
        } else if shape[1] == ROW_LEN {
            true
        } else {
            shape[1] < shape[2]
        };
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < ROW_LEN {
            return Err(SwapError::Inference(format!(
                "detector rows carry {num_feats} values, need {ROW_LEN} for keypoints"
            )));
        }

        let unmap = |x: f32, y: f32| ((x - pad_x as f32) / scale, (y - pad_y as f32) / scale);
        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let at = |f: usize| {
                let idx = if transposed { [0, f, i] } else { [0, i, f] };
                tensor[IxDyn(&idx)]
            };
            let conf = at(4);
            if conf < CANDIDATE_CONFIDENCE {
                continue;
            }
            let (cx, cy, w, h) = (at(0), at(1), at(2), at(3));
            let (x1, y1) = unmap(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = unmap(cx + w / 2.0, cy + h / 2.0);

            let mut points = [(0.0f32, 0.0f32); 5];
            for (k, point) in points.iter_mut().enumerate() {
                *point = unmap(at(5 + k * 3), at(5 + k * 3 + 1));
            }

            candidates.push(RawFace {
                bbox: BoundingBox::new(x1, y1, x2, y2),
                landmarks: FaceLandmarks::new(points),
                score: conf,
            });
        }

        Ok(nms(candidates, NMS_IOU_THRESH))
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(frame: &Frame, target_size: u32) -> (Array4<f32>, f32, u32, u32) {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let target = target_size as f32;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // 114 gray padding, YOLO convention.
    let gray = 114.0f32 / 255.0;
    let size = target_size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Greedy NMS: highest score first, suppress boxes overlapping a kept one.
fn nms(mut faces: Vec<RawFace>, iou_thresh: f32) -> Vec<RawFace> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut keep: Vec<RawFace> = Vec::new();
    for face in faces {
        if keep.iter().all(|k| k.bbox.iou(&face.bbox) <= iou_thresh) {
            keep.push(face);
        }
    }
    keep
}
