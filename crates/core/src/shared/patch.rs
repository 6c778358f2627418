use crate::shared::error::SwapError;
use crate::shared::frame::CHANNELS;

/// Frame-space rectangle covered by a synthesized patch, already clamped to
/// the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PatchRegion {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the rectangle lies entirely inside a `width x height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Packed RGB pixel buffer not tied to a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Patch {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * CHANNELS,
            "patch data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * CHANNELS)
            .collect();
        Self::new(data, width, height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Per-pixel blend weight in `[0, 1]`; 0 keeps the frame, 1 takes the patch.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendMask {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl BlendMask {
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize,
            "mask data length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self::new(
            vec![value.clamp(0.0, 1.0); width as usize * height as usize],
            width,
            height,
        )
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn value(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Output of one face swap: a patch and its mask, both sized to `region`.
///
/// Transient: consumed by the compositor within the frame cycle that
/// produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapResult {
    region: PatchRegion,
    patch: Patch,
    mask: BlendMask,
}

impl SwapResult {
    pub fn new(region: PatchRegion, patch: Patch, mask: BlendMask) -> Result<Self, SwapError> {
        check_dimensions(&region, &patch, &mask)?;
        Ok(Self {
            region,
            patch,
            mask,
        })
    }

    pub fn region(&self) -> PatchRegion {
        self.region
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn mask(&self) -> &BlendMask {
        &self.mask
    }

    /// Replace the patch, e.g. with an enhanced version of the same size.
    pub fn with_patch(self, patch: Patch) -> Result<Self, SwapError> {
        Self::new(self.region, patch, self.mask)
    }
}

fn check_dimensions(region: &PatchRegion, patch: &Patch, mask: &BlendMask) -> Result<(), SwapError> {
    let size = (region.width, region.height);
    if (patch.width(), patch.height()) != size || (mask.width(), mask.height()) != size {
        return Err(SwapError::InvalidInput(format!(
            "patch {}x{} and mask {}x{} must match region {}x{}",
            patch.width(),
            patch.height(),
            mask.width(),
            mask.height(),
            region.width,
            region.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(width: u32, height: u32) -> PatchRegion {
        PatchRegion {
            x: 4,
            y: 2,
            width,
            height,
        }
    }

    #[test]
    fn test_swap_result_accepts_matching_sizes() {
        let result = SwapResult::new(
            region(3, 2),
            Patch::filled(3, 2, [1, 2, 3]),
            BlendMask::filled(3, 2, 1.0),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_swap_result_rejects_mismatched_patch() {
        let result = SwapResult::new(
            region(3, 2),
            Patch::filled(2, 2, [1, 2, 3]),
            BlendMask::filled(3, 2, 1.0),
        );
        assert!(matches!(result, Err(SwapError::InvalidInput(_))));
    }

    #[test]
    fn test_with_patch_keeps_region_and_mask() {
        let result = SwapResult::new(
            region(2, 2),
            Patch::filled(2, 2, [0, 0, 0]),
            BlendMask::filled(2, 2, 0.5),
        )
        .unwrap();
        let replaced = result.with_patch(Patch::filled(2, 2, [9, 9, 9])).unwrap();
        assert_eq!(replaced.patch().pixel(1, 1), [9, 9, 9]);
        assert_eq!(replaced.mask().value(0, 0), 0.5);
        assert_eq!(replaced.region().x, 4);
    }

    #[test]
    fn test_fits_within_frame_edges() {
        let inside = PatchRegion {
            x: 8,
            y: 8,
            width: 8,
            height: 8,
        };
        assert!(inside.fits_within(16, 16));
        assert!(!PatchRegion { x: 12, ..inside }.fits_within(16, 16));
        assert!(!PatchRegion { y: 12, ..inside }.fits_within(16, 16));
        assert!(!PatchRegion { x: u32::MAX, ..inside }.fits_within(16, 16));
    }

    #[test]
    #[should_panic(expected = "patch data length must equal width * height * 3")]
    fn test_patch_rejects_short_buffer() {
        Patch::new(vec![0u8; 5], 2, 1);
    }

    #[test]
    #[should_panic(expected = "mask data length must equal width * height")]
    fn test_mask_rejects_short_buffer() {
        BlendMask::new(vec![0.0; 3], 2, 2);
    }

    #[test]
    fn test_mask_filled_clamps() {
        let mask = BlendMask::filled(1, 1, 3.0);
        assert_eq!(mask.value(0, 0), 1.0);
    }
}
