//! 4-DOF similarity alignment between frame space and the canonical
//! ArcFace landmark layout.

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::error::SwapError;
use crate::shared::frame::CHANNELS;

/// ArcFace reference landmarks for a 112×112 crop.
const ARCFACE_TEMPLATE_112: [(f32, f32); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Below this the transform collapses the face to a point.
const MIN_SCALE: f32 = 1e-6;

/// Eyes closer than this cannot define an orientation.
const MIN_EYE_DISTANCE: f32 = 2.0;

/// The ArcFace template scaled to a `size` × `size` crop.
pub fn arcface_template(size: u32) -> [(f32, f32); 5] {
    let s = size as f32 / 112.0;
    ARCFACE_TEMPLATE_112.map(|(x, y)| (x * s, y * s))
}

/// `(x, y) -> (a·x − b·y + tx, b·x + a·y + ty)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Least-squares similarity mapping `src` onto `dst`, closed form.
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Result<Self, SwapError> {
        let n = src.len() as f32;
        let (mut msx, mut msy, mut mdx, mut mdy) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst) {
            msx += sx;
            msy += sy;
            mdx += dx;
            mdy += dy;
        }
        msx /= n;
        msy /= n;
        mdx /= n;
        mdy /= n;

        let (mut num_a, mut num_b, mut den) = (0.0f32, 0.0f32, 0.0f32);
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst) {
            let (sx, sy, dx, dy) = (sx - msx, sy - msy, dx - mdx, dy - mdy);
            num_a += sx * dx + sy * dy;
            num_b += sx * dy - sy * dx;
            den += sx * sx + sy * sy;
        }
        if !(den.is_finite() && den > 0.0) {
            return Err(SwapError::DegenerateAlignment("landmarks have no spread"));
        }

        let a = num_a / den;
        let b = num_b / den;
        let t = Self {
            a,
            b,
            tx: mdx - (a * msx - b * msy),
            ty: mdy - (b * msx + a * msy),
        };
        t.validate()?;
        Ok(t)
    }

    /// Transform from frame space onto the ArcFace template at `size`.
    ///
    /// Rejects landmarks that cannot produce a usable crop: non-finite,
    /// outside the frame, or eyes collapsed onto each other.
    pub fn to_template(
        landmarks: &FaceLandmarks,
        frame_width: u32,
        frame_height: u32,
        size: u32,
    ) -> Result<Self, SwapError> {
        if !landmarks.is_finite() {
            return Err(SwapError::DegenerateAlignment("non-finite landmarks"));
        }
        if !landmarks.inside(frame_width, frame_height) {
            return Err(SwapError::DegenerateAlignment("landmark outside the frame"));
        }
        if landmarks.eye_distance() < MIN_EYE_DISTANCE {
            return Err(SwapError::DegenerateAlignment("eyes too close together"));
        }
        Self::estimate(landmarks.points(), &arcface_template(size))
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    /// Analytic inverse; `self.inverse().apply(self.apply(p)) == p`.
    pub fn inverse(&self) -> Self {
        let det = self.a * self.a + self.b * self.b;
        let a = self.a / det;
        let b = -self.b / det;
        Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        }
    }

    pub fn scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn validate(&self) -> Result<(), SwapError> {
        if ![self.a, self.b, self.tx, self.ty].iter().all(|v| v.is_finite()) {
            return Err(SwapError::DegenerateAlignment("non-finite transform"));
        }
        if self.scale() < MIN_SCALE {
            return Err(SwapError::DegenerateAlignment("near-zero scale"));
        }
        Ok(())
    }
}

/// Bilinear sample of a packed RGB buffer; `None` outside the image.
pub fn sample_rgb(data: &[u8], width: u32, height: u32, x: f32, y: f32) -> Option<[f32; 3]> {
    let (w, h) = (width as i64, height as i64);
    if !(x > -1.0 && y > -1.0 && x < w as f32 && y < h as f32) {
        return None;
    }
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = [0.0f32; 3];
    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let sx = x0 + dx;
            let sy = y0 + dy;
            if sx < 0 || sy < 0 || sx >= w || sy >= h {
                continue;
            }
            let offset = (sy as usize * width as usize + sx as usize) * CHANNELS;
            let weight = wx * wy;
            for c in 0..CHANNELS {
                out[c] += data[offset + c] as f32 * weight;
            }
        }
    }
    Some(out)
}

/// Bilinear sample of a single-channel plane; 0 outside.
pub fn sample_plane(plane: &[f32], width: u32, height: u32, x: f32, y: f32) -> f32 {
    let (w, h) = (width as i64, height as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let mut out = 0.0;
    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let sx = x0 + dx;
            let sy = y0 + dy;
            if sx >= 0 && sy >= 0 && sx < w && sy < h {
                out += plane[sy as usize * width as usize + sx as usize] * wx * wy;
            }
        }
    }
    out
}

/// Warp a packed RGB image into an `out_size` × `out_size` crop.
///
/// `transform` maps source coordinates to crop coordinates. Crop pixels
/// whose preimage falls outside the source are black.
pub fn warp_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    transform: &SimilarityTransform,
    out_size: u32,
) -> Vec<u8> {
    let inverse = transform.inverse();
    let size = out_size as usize;
    let mut out = vec![0u8; size * size * CHANNELS];
    for oy in 0..size {
        for ox in 0..size {
            let (sx, sy) = inverse.apply((ox as f32, oy as f32));
            if let Some(rgb) = sample_rgb(data, width, height, sx, sy) {
                let offset = (oy * size + ox) * CHANNELS;
                for c in 0..CHANNELS {
                    out[offset + c] = rgb[c].round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
    out
}
