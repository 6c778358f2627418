use crate::compositing::color_transfer::match_colors;
use crate::shared::detected_face::DetectedFace;
use crate::shared::error::SwapError;
use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::patch::SwapResult;

#[derive(Clone, Debug, PartialEq)]
pub struct CompositorConfig {
    /// Match patch colors to the frame under the mask before blending.
    pub color_match: bool,
    /// Upper clamp on the per-channel std ratio (lower clamp is its inverse).
    pub max_std_ratio: f32,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            color_match: true,
            max_std_ratio: 2.0,
        }
    }
}

/// Blends swap results back into a frame.
pub struct Compositor {
    config: CompositorConfig,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    /// New frame with every result blended in, in order.
    ///
    /// Later results win where regions overlap. Pixels outside every mask
    /// keep their input bytes, and the sequence number is preserved.
    /// A result whose region is not inside the frame is rejected.
    pub fn composite(
        &self,
        frame: &Frame,
        results: &[(DetectedFace, SwapResult)],
    ) -> Result<Frame, SwapError> {
        if results.is_empty() {
            return Ok(frame.clone());
        }

        let width = frame.width() as usize;
        let mut out = frame.data().to_vec();
        for (_, result) in results {
            let region = result.region();
            if !region.fits_within(frame.width(), frame.height()) {
                return Err(SwapError::InvalidInput(format!(
                    "patch region {}x{} at ({}, {}) exceeds {}x{} frame {}",
                    region.width,
                    region.height,
                    region.x,
                    region.y,
                    frame.width(),
                    frame.height(),
                    frame.sequence()
                )));
            }
            let matched;
            let patch = if self.config.color_match {
                matched = match_colors(
                    frame,
                    region,
                    result.patch(),
                    result.mask(),
                    self.config.max_std_ratio,
                );
                &matched
            } else {
                result.patch()
            };

            for y in 0..region.height {
                for x in 0..region.width {
                    let m = result.mask().value(x, y);
                    if m <= 0.0 {
                        continue;
                    }
                    let src = patch.pixel(x, y);
                    let offset = ((region.y + y) as usize * width + (region.x + x) as usize) * CHANNELS;
                    for c in 0..CHANNELS {
                        let base = out[offset + c] as f32;
                        let v = base * (1.0 - m) + src[c] as f32 * m;
                        out[offset + c] = v.round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
        Ok(frame.with_data(out))
    }
}
