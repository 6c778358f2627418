//! GFPGAN restoration at 512×512.
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array4, ArrayD, IxDyn};

use crate::enhancement::domain::face_enhancer::FaceEnhancer;
use crate::inference::domain::inference_session::ModelHandle;
use crate::shared::error::SwapError;
use crate::shared::frame::CHANNELS;
use crate::shared::patch::Patch;

const ENHANCE_SIZE: u32 = 512;

#[derive(Clone, Debug, PartialEq)]
pub struct EnhancerConfig {
    /// Weight of the restored patch against the input, in `[0, 1]`.
    pub blend: f32,
}

impl Default for EnhancerConfig {
    fn default() -> Self {
        Self { blend: 1.0 }
    }
}

pub struct GfpganEnhancer {
    model: ModelHandle,
    blend: f32,
}

impl GfpganEnhancer {
    pub fn new(model: ModelHandle, config: &EnhancerConfig) -> Self {
        Self {
            model,
            blend: config.blend.clamp(0.0, 1.0),
        }
    }
}

impl FaceEnhancer for GfpganEnhancer {
    fn enhance(&self, patch: &Patch) -> Result<Patch, SwapError> {
        if patch.width() == 0 || patch.height() == 0 {
            return Ok(patch.clone());
        }
        let image = RgbImage::from_raw(patch.width(), patch.height(), patch.data().to_vec())
            .ok_or_else(|| SwapError::InvalidInput("patch buffer does not match its size".into()))?;
        let resized = imageops::resize(&image, ENHANCE_SIZE, ENHANCE_SIZE, FilterType::Triangle);

        let outputs = self.model.run(vec![to_tensor(&resized).into_dyn()])?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::Inference("enhancer produced no outputs".into()))?;
        let restored = from_tensor(&output)?;
        let back = imageops::resize(&restored, patch.width(), patch.height(), FilterType::Triangle);

        let w = self.blend;
        let data = patch
            .data()
            .iter()
            .zip(back.as_raw())
            .map(|(&orig, &new)| {
                (orig as f32 * (1.0 - w) + new as f32 * w)
                    .round()
                    .clamp(0.0, 255.0) as u8
            })
            .collect();
        Ok(Patch::new(data, patch.width(), patch.height()))
    }
}

/// NCHW RGB normalized to `[-1, 1]`.
fn to_tensor(image: &RgbImage) -> Array4<f32> {
    let size = ENHANCE_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..CHANNELS {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 127.5 - 1.0;
        }
    }
    tensor
}

fn from_tensor(output: &ArrayD<f32>) -> Result<RgbImage, SwapError> {
    let size = ENHANCE_SIZE as usize;
    if output.shape() != [1, 3, size, size].as_slice() {
        return Err(SwapError::Inference(format!(
            "unexpected enhancer output shape {:?}",
            output.shape()
        )));
    }
    let mut image = RgbImage::new(ENHANCE_SIZE, ENHANCE_SIZE);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        for c in 0..CHANNELS {
            let v = output[IxDyn(&[0, c, y as usize, x as usize])].clamp(-1.0, 1.0);
            pixel[c] = ((v + 1.0) * 127.5).round() as u8;
        }
    }
    Ok(image)
}
