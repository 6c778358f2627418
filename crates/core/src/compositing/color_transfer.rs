//! Mean/std color transfer of a patch toward the frame it lands on.

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::patch::{BlendMask, Patch, PatchRegion};

/// Pixels with mask weight at or above this contribute to the statistics.
const STATS_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default)]
struct ChannelStats {
    mean: [f32; CHANNELS],
    std: [f32; CHANNELS],
}

/// Shift and scale each patch channel so its statistics under the mask
/// match the frame's. The std ratio is clamped to
/// `[1 / max_std_ratio, max_std_ratio]`.
pub fn match_colors(
    frame: &Frame,
    region: PatchRegion,
    patch: &Patch,
    mask: &BlendMask,
    max_std_ratio: f32,
) -> Patch {
    let mut frame_px = Vec::new();
    let mut patch_px = Vec::new();
    for y in 0..region.height {
        for x in 0..region.width {
            if mask.value(x, y) >= STATS_THRESHOLD {
                frame_px.push(frame.pixel(region.x + x, region.y + y));
                patch_px.push(patch.pixel(x, y));
            }
        }
    }
    if patch_px.len() < 2 {
        return patch.clone();
    }

    let target = stats(&frame_px);
    let current = stats(&patch_px);
    let max_ratio = max_std_ratio.max(1.0);

    let mut data = patch.data().to_vec();
    for px in data.chunks_exact_mut(CHANNELS) {
        for c in 0..CHANNELS {
            let ratio = if current.std[c] > 1e-3 {
                (target.std[c] / current.std[c]).clamp(1.0 / max_ratio, max_ratio)
            } else {
                1.0
            };
            let v = (px[c] as f32 - current.mean[c]) * ratio + target.mean[c];
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    Patch::new(data, patch.width(), patch.height())
}

fn stats(pixels: &[[u8; 3]]) -> ChannelStats {
    let n = pixels.len() as f32;
    let mut s = ChannelStats::default();
    for p in pixels {
        for c in 0..CHANNELS {
            s.mean[c] += p[c] as f32;
        }
    }
    for c in 0..CHANNELS {
        s.mean[c] /= n;
    }
    for p in pixels {
        for c in 0..CHANNELS {
            let d = p[c] as f32 - s.mean[c];
            s.std[c] += d * d;
        }
    }
    for c in 0..CHANNELS {
        s.std[c] = (s.std[c] / n).sqrt();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> PatchRegion {
        PatchRegion {
            x: 2,
            y: 2,
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn test_uniform_patch_takes_frame_mean() {
        let frame = Frame::filled(10, 10, [200, 100, 50], 0);
        let patch = Patch::filled(4, 4, [10, 20, 30]);
        let out = match_colors(&frame, region(), &patch, &BlendMask::filled(4, 4, 1.0), 2.0);
        assert_eq!(out.pixel(1, 1), [200, 100, 50]);
    }

    #[test]
    fn test_std_ratio_clamped() {
        // Patch alternates 0/100 (std 50); frame is noisy 0/255 (std 127.5).
        let mut frame_data = Vec::new();
        for i in 0..100 {
            let v = if i % 2 == 0 { 0 } else { 255 };
            frame_data.extend([v, v, v]);
        }
        let frame = Frame::new(frame_data, 10, 10, 0);
        let mut patch_data = Vec::new();
        for i in 0..16 {
            let v = if i % 2 == 0 { 0 } else { 100 };
            patch_data.extend([v, v, v]);
        }
        let patch = Patch::new(patch_data, 4, 4);
        let out = match_colors(&frame, region(), &patch, &BlendMask::filled(4, 4, 1.0), 2.0);

        let hi = out.pixel(1, 0)[0] as i32;
        let lo = out.pixel(0, 0)[0] as i32;
        // Spread doubles at most: 100 -> 200.
        assert!((hi - lo - 200).abs() <= 1, "spread {}", hi - lo);
    }

    #[test]
    fn test_empty_mask_leaves_patch() {
        let frame = Frame::filled(10, 10, [200, 100, 50], 0);
        let patch = Patch::filled(4, 4, [10, 20, 30]);
        let out = match_colors(&frame, region(), &patch, &BlendMask::filled(4, 4, 0.0), 2.0);
        assert_eq!(out, patch);
    }
}
