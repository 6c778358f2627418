//! Five-point face landmarks in frame pixel coordinates.
//!
//! Point order follows the ArcFace convention: left eye, right eye, nose,
//! left mouth corner, right mouth corner.

pub const LEFT_EYE: usize = 0;
pub const RIGHT_EYE: usize = 1;
pub const NOSE: usize = 2;
pub const LEFT_MOUTH: usize = 3;
pub const RIGHT_MOUTH: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: [(f32, f32); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f32, f32); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f32, f32); 5] {
        &self.points
    }

    pub fn is_finite(&self) -> bool {
        self.points
            .iter()
            .all(|(x, y)| x.is_finite() && y.is_finite())
    }

    /// Every point lies within a `width` × `height` frame.
    pub fn inside(&self, width: u32, height: u32) -> bool {
        let (w, h) = (width as f32, height as f32);
        self.points
            .iter()
            .all(|&(x, y)| x >= 0.0 && y >= 0.0 && x < w && y < h)
    }

    /// Distance between the two eye centers in pixels.
    pub fn eye_distance(&self) -> f32 {
        let (lx, ly) = self.points[LEFT_EYE];
        let (rx, ry) = self.points[RIGHT_EYE];
        ((rx - lx).powi(2) + (ry - ly).powi(2)).sqrt()
    }

    pub fn mouth_corners(&self) -> ((f32, f32), (f32, f32)) {
        (self.points[LEFT_MOUTH], self.points[RIGHT_MOUTH])
    }

    /// Horizontal mirror inside a frame of the given width.
    ///
    /// Left and right points swap so the result stays in canonical order.
    pub fn mirrored(&self, width: u32) -> Self {
        let w = width as f32 - 1.0;
        let p = self.points.map(|(x, y)| (w - x, y));
        Self::new([p[1], p[0], p[2], p[4], p[3]])
    }
}
