use ndarray::ArrayView3;

use crate::shared::error::SwapError;

/// Color channels per pixel. Frames are always packed RGB.
pub const CHANNELS: usize = 3;

/// A single captured video frame: packed RGB bytes in row-major order plus
/// the capture sequence number.
///
/// Frames are immutable once produced. Stages that change pixels build a
/// new frame with [`Frame::with_data`], which keeps the sequence number.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
}

impl Frame {
    /// Panics when `data` does not hold exactly `width * height * 3` bytes.
    /// Use [`Frame::try_new`] for buffers from outside the crate.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Checked constructor for data arriving from I/O adapters.
    pub fn try_new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self, SwapError> {
        let expected = (width as usize) * (height as usize) * CHANNELS;
        if data.len() != expected {
            return Err(SwapError::InvalidInput(format!(
                "frame {sequence}: expected {expected} bytes for {width}x{height}, got {}",
                data.len()
            )));
        }
        Ok(Self::new(data, width, height, sequence))
    }

    /// A frame filled with a single color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width as usize) * (height as usize) * CHANNELS)
            .collect();
        Self::new(data, width, height, sequence)
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

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = ((y as usize) * (self.width as usize) + x as usize) * CHANNELS;
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    /// New frame with the same dimensions and sequence number.
    pub fn with_data(&self, data: Vec<u8>) -> Frame {
        Frame::new(data, self.width, self.height, self.sequence)
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }
}
