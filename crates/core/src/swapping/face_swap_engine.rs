use std::borrow::Cow;
use std::fs;
use std::path::Path;

use log::{debug, info};
use ndarray::{Array2, Array4, ArrayD, IxDyn};

use crate::inference::domain::inference_session::ModelHandle;
use crate::shared::alignment::{sample_plane, sample_rgb, warp_rgb, SimilarityTransform};
use crate::shared::constants::EMBEDDING_DIM;
use crate::shared::detected_face::DetectedFace;
use crate::shared::embedding::l2_normalize;
use crate::shared::error::SwapError;
use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::patch::{BlendMask, Patch, PatchRegion, SwapResult};
use crate::swapping::domain::blend_mask::{carve, feathered_box, mouth_region, MouthMask};

/// Side length of the generator's aligned crop.
pub const SWAP_SIZE: u32 = 128;

#[derive(Clone, Debug, PartialEq)]
pub struct SwapConfig {
    /// Gaussian feather width is `SWAP_SIZE / mask_feather_ratio`.
    pub mask_feather_ratio: f32,
    /// Fraction of the crop trimmed from each side of the blend box.
    pub mask_erode_ratio: f32,
    /// Keep the target's own mouth instead of the generated one.
    pub mouth_mask: Option<MouthMask>,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            mask_feather_ratio: 8.0,
            mask_erode_ratio: 0.1,
            mouth_mask: None,
        }
    }
}

/// Replaces a target face's identity using an embedding-conditioned
/// generator and maps the result back into frame space.
pub struct FaceSwapEngine {
    model: ModelHandle,
    projection: Option<Array2<f32>>,
    mask: Vec<f32>,
    mouth_mask: Option<MouthMask>,
    feather_ratio: f32,
}

impl FaceSwapEngine {
    pub fn new(model: ModelHandle, config: &SwapConfig) -> Self {
        Self {
            model,
            projection: None,
            mask: feathered_box(SWAP_SIZE, config.mask_erode_ratio, config.mask_feather_ratio),
            mouth_mask: config.mouth_mask,
            feather_ratio: config.mask_feather_ratio,
        }
    }

    /// Project source embeddings through `projection` (512 × 512) before use.
    pub fn with_projection(mut self, projection: Array2<f32>) -> Result<Self, SwapError> {
        if projection.dim() != (EMBEDDING_DIM, EMBEDDING_DIM) {
            return Err(SwapError::InvalidInput(format!(
                "identity projection must be {EMBEDDING_DIM}x{EMBEDDING_DIM}, got {:?}",
                projection.dim()
            )));
        }
        self.projection = Some(projection);
        Ok(self)
    }

    /// Read a row-major little-endian f32 projection matrix from disk.
    pub fn load_projection(path: &Path) -> Result<Array2<f32>, SwapError> {
        let bytes = fs::read(path)?;
        let expected = EMBEDDING_DIM * EMBEDDING_DIM * 4;
        if bytes.len() != expected {
            return Err(SwapError::InvalidInput(format!(
                "{}: expected {expected} bytes, found {}",
                path.display(),
                bytes.len()
            )));
        }
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        info!("Loaded identity projection from {}", path.display());
        Array2::from_shape_vec((EMBEDDING_DIM, EMBEDDING_DIM), values)
            .map_err(|e| SwapError::InvalidInput(e.to_string()))
    }

    /// Swap `face` in `frame` to the identity `source_embedding`.
    ///
    /// `Ok(None)` when the face cannot be aligned; the caller counts it as
    /// skipped.
    pub fn swap(
        &self,
        face: &DetectedFace,
        source_embedding: &[f32],
        frame: &Frame,
    ) -> Result<Option<SwapResult>, SwapError> {
        let (fw, fh) = (frame.width(), frame.height());
        let transform = match SimilarityTransform::to_template(&face.landmarks, fw, fh, SWAP_SIZE) {
            Ok(t) => t,
            Err(SwapError::DegenerateAlignment(reason)) => {
                debug!("Frame {}: skipping face: {reason}", frame.sequence());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some(region) = back_projected_region(&transform, fw, fh) else {
            debug!("Frame {}: skipping face: empty paste region", frame.sequence());
            return Ok(None);
        };

        let crop = warp_rgb(frame.data(), fw, fh, &transform, SWAP_SIZE);
        let latent = self.latent(source_embedding)?;
        let outputs = self
            .model
            .run(vec![crop_tensor(&crop).into_dyn(), latent.into_dyn()])?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::Inference("swapper produced no outputs".into()))?;
        let swapped = denormalize(&output)?;

        let mask = self.face_mask(face, &transform);
        let (patch, mask) = self.paste_back(&swapped, &mask, &transform, region);
        SwapResult::new(region, patch, mask).map(Some)
    }

    /// Aligned-space blend mask for one face, with the mouth carved out
    /// when the mouth mask is on.
    fn face_mask(&self, face: &DetectedFace, transform: &SimilarityTransform) -> Cow<'_, [f32]> {
        let Some(mouth) = &self.mouth_mask else {
            return Cow::Borrowed(&self.mask);
        };
        let (left, right) = face.landmarks.mouth_corners();
        let keep = mouth_region(
            SWAP_SIZE,
            transform.apply(left),
            transform.apply(right),
            mouth,
            self.feather_ratio,
        );
        Cow::Owned(carve(&self.mask, &keep))
    }

    fn latent(&self, source_embedding: &[f32]) -> Result<Array2<f32>, SwapError> {
        if source_embedding.len() != EMBEDDING_DIM {
            return Err(SwapError::InvalidInput(format!(
                "source embedding must have {EMBEDDING_DIM} values, got {}",
                source_embedding.len()
            )));
        }
        let row = Array2::from_shape_vec((1, EMBEDDING_DIM), source_embedding.to_vec())
            .map_err(|e| SwapError::InvalidInput(e.to_string()))?;
        let mut latent = match &self.projection {
            Some(p) => row.dot(p),
            None => row,
        };
        if let Some(values) = latent.as_slice_mut() {
            l2_normalize(values);
        }
        Ok(latent)
    }

    /// Resample the aligned output and mask over every frame pixel in `region`.
    fn paste_back(
        &self,
        swapped: &[u8],
        mask: &[f32],
        transform: &SimilarityTransform,
        region: PatchRegion,
    ) -> (Patch, BlendMask) {
        let mut pixels = vec![0u8; region.pixel_count() * CHANNELS];
        let mut weights = vec![0.0f32; region.pixel_count()];
        for ry in 0..region.height {
            for rx in 0..region.width {
                let fx = (region.x + rx) as f32;
                let fy = (region.y + ry) as f32;
                let (u, v) = transform.apply((fx, fy));
                let i = (ry * region.width + rx) as usize;
                weights[i] = sample_plane(mask, SWAP_SIZE, SWAP_SIZE, u, v).clamp(0.0, 1.0);
                if let Some(rgb) = sample_rgb(swapped, SWAP_SIZE, SWAP_SIZE, u, v) {
                    for c in 0..CHANNELS {
                        pixels[i * CHANNELS + c] = rgb[c].round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
        (
            Patch::new(pixels, region.width, region.height),
            BlendMask::new(weights, region.width, region.height),
        )
    }
}

/// Frame-space rectangle covering the aligned crop, clamped to the frame.
fn back_projected_region(
    transform: &SimilarityTransform,
    frame_width: u32,
    frame_height: u32,
) -> Option<PatchRegion> {
    let inverse = transform.inverse();
    let s = SWAP_SIZE as f32;
    let corners = [(0.0, 0.0), (s, 0.0), (0.0, s), (s, s)].map(|p| inverse.apply(p));

    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
    let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
    if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
        return None;
    }

    let x1 = min_x.floor().max(0.0) as u32;
    let y1 = min_y.floor().max(0.0) as u32;
    let x2 = (max_x.ceil().max(0.0) as u32).min(frame_width);
    let y2 = (max_y.ceil().max(0.0) as u32).min(frame_height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(PatchRegion {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    })
}

/// NCHW RGB in `[0, 1]`.
fn crop_tensor(crop: &[u8]) -> Array4<f32> {
    let size = SWAP_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * CHANNELS;
            for c in 0..CHANNELS {
                tensor[[0, c, y, x]] = crop[offset + c] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// NCHW `[0, 1]` output back to packed RGB bytes.
fn denormalize(output: &ArrayD<f32>) -> Result<Vec<u8>, SwapError> {
    let size = SWAP_SIZE as usize;
    if output.shape() != [1, 3, size, size].as_slice() {
        return Err(SwapError::Inference(format!(
            "unexpected swapper output shape {:?}",
            output.shape()
        )));
    }
    let mut rgb = vec![0u8; size * size * CHANNELS];
    for y in 0..size {
        for x in 0..size {
            for c in 0..CHANNELS {
                let v = output[IxDyn(&[0, c, y, x])] * 255.0;
                rgb[(y * size + x) * CHANNELS + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    Ok(rgb)
}
