//! Blend masks in aligned-crop space.

use crate::shared::gaussian::blur_plane;

/// Region around the mouth that keeps the target's own pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouthMask {
    /// Grows the kept region sideways and upward, in mouth widths.
    pub size: f32,
    /// How far below the mouth corners the region reaches, in mouth widths.
    pub down_size: f32,
}

impl Default for MouthMask {
    fn default() -> Self {
        Self {
            size: 1.0,
            down_size: 0.5,
        }
    }
}

/// A `size` × `size` mask: 1 inside a box inset by `erode_ratio · size` on
/// every side, 0 outside, softened with a Gaussian of roughly
/// `size / feather_ratio` pixels.
pub fn feathered_box(size: u32, erode_ratio: f32, feather_ratio: f32) -> Vec<f32> {
    let n = size as usize;
    let margin = ((size as f32 * erode_ratio).round() as usize).min(n / 2);
    let mut plane = vec![0.0f32; n * n];
    for y in margin..n - margin {
        for x in margin..n - margin {
            plane[y * n + x] = 1.0;
        }
    }

    let kernel = feather_kernel(size, feather_ratio);
    blur_plane(&mut plane, n, n, kernel);
    for v in &mut plane {
        *v = v.clamp(0.0, 1.0);
    }
    plane
}

/// Weight in `[0, 1]` of the target's mouth in a `size` × `size` crop,
/// given the mouth corners in crop coordinates.
///
/// The region is an ellipse centred between the corners: half-width
/// `0.5 · w · (1 + 0.2 · mask.size)`, reaching `0.25 · w · mask.size` above
/// and `w · mask.down_size` below the corner line, where `w` is the corner
/// distance. Corners closer than one pixel give an empty region.
pub fn mouth_region(
    size: u32,
    left: (f32, f32),
    right: (f32, f32),
    mask: &MouthMask,
    feather_ratio: f32,
) -> Vec<f32> {
    let n = size as usize;
    let mut plane = vec![0.0f32; n * n];
    let w = ((right.0 - left.0).powi(2) + (right.1 - left.1).powi(2)).sqrt();
    if !w.is_finite() || w < 1.0 {
        return plane;
    }

    let (cx, cy) = ((left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0);
    let half_width = 0.5 * w * (1.0 + 0.2 * mask.size.max(0.0));
    let up = (0.25 * w * mask.size).max(1.0);
    let down = (w * mask.down_size).max(1.0);
    for y in 0..n {
        for x in 0..n {
            let dx = (x as f32 + 0.5 - cx) / half_width;
            let dy = y as f32 + 0.5 - cy;
            let dy = if dy < 0.0 { dy / up } else { dy / down };
            if dx * dx + dy * dy <= 1.0 {
                plane[y * n + x] = 1.0;
            }
        }
    }

    blur_plane(&mut plane, n, n, feather_kernel(size, feather_ratio * 2.0));
    for v in &mut plane {
        *v = v.clamp(0.0, 1.0);
    }
    plane
}

/// `mask · (1 − keep)` per pixel.
pub fn carve(mask: &[f32], keep: &[f32]) -> Vec<f32> {
    mask.iter()
        .zip(keep)
        .map(|(&m, &k)| (m * (1.0 - k)).clamp(0.0, 1.0))
        .collect()
}

/// Odd Gaussian kernel width for `size / feather_ratio`.
fn feather_kernel(size: u32, feather_ratio: f32) -> usize {
    if feather_ratio <= 0.0 {
        return 1;
    }
    let k = ((size as f32 / feather_ratio).round() as usize).max(1);
    k | 1
}
