use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_sink::FrameSink;

type BoxError = Box<dyn std::error::Error>;

fn save_frame(path: &Path, frame: &Frame) -> Result<(), BoxError> {
    let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or("Failed to create image from frame data")?;
    img.save(path)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), BoxError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Writes exactly one frame to an image file; the format follows the
/// path's extension.
pub struct ImageFileSink {
    path: Option<PathBuf>,
    written: bool,
}

impl ImageFileSink {
    pub fn new() -> Self {
        Self {
            path: None,
            written: false,
        }
    }
}

impl Default for ImageFileSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for ImageFileSink {
    fn open(&mut self, path: &Path, _metadata: &VideoMetadata) -> Result<(), BoxError> {
        ensure_parent(path)?;
        self.path = Some(path.to_path_buf());
        self.written = false;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
        let path = self.path.as_deref().ok_or("ImageFileSink: not opened")?;
        if self.written {
            return Err(format!("{} already holds a frame", path.display()).into());
        }
        save_frame(path, frame)?;
        self.written = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.path = None;
        Ok(())
    }
}

/// Writes each frame as `frame_{sequence:06}.png` inside a directory.
pub struct ImageSequenceSink {
    dir: Option<PathBuf>,
}

impl ImageSequenceSink {
    pub fn new() -> Self {
        Self { dir: None }
    }

    pub fn frame_path(dir: &Path, sequence: u64) -> PathBuf {
        dir.join(format!("frame_{sequence:06}.png"))
    }
}

impl Default for ImageSequenceSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for ImageSequenceSink {
    fn open(&mut self, path: &Path, _metadata: &VideoMetadata) -> Result<(), BoxError> {
        fs::create_dir_all(path)?;
        self.dir = Some(path.to_path_buf());
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), BoxError> {
        let dir = self.dir.as_deref().ok_or("ImageSequenceSink: not opened")?;
        save_frame(&Self::frame_path(dir, frame.sequence()), frame)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.dir = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::domain::frame_source::FrameSource;
    use crate::video::infrastructure::image_file_source::ImageFileSource;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            width: 6,
            height: 4,
            fps: 0.0,
            total_frames: None,
            source_path: None,
        }
    }

    #[test]
    fn test_single_image_written_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");

        let mut sink = ImageFileSink::new();
        sink.open(&path, &metadata()).unwrap();
        sink.write(&Frame::filled(6, 4, [200, 100, 50], 0)).unwrap();
        sink.close().unwrap();

        let img = image::open(&path).unwrap().into_rgb8();
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(img.get_pixel(5, 3).0, [200, 100, 50]);
    }

    #[test]
    fn test_single_image_rejects_second_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageFileSink::new();
        sink.open(&dir.path().join("out.png"), &metadata()).unwrap();
        sink.write(&Frame::filled(6, 4, [0, 0, 0], 0)).unwrap();
        assert!(sink.write(&Frame::filled(6, 4, [0, 0, 0], 1)).is_err());
    }

    #[test]
    fn test_write_before_open_fails() {
        assert!(ImageFileSink::new()
            .write(&Frame::filled(2, 2, [0, 0, 0], 0))
            .is_err());
        assert!(ImageSequenceSink::new()
            .write(&Frame::filled(2, 2, [0, 0, 0], 0))
            .is_err());
    }

    #[test]
    fn test_sequence_named_by_frame_number_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");

        let mut sink = ImageSequenceSink::new();
        sink.open(&out, &metadata()).unwrap();
        for seq in [0u64, 3, 7] {
            sink.write(&Frame::filled(6, 4, [seq as u8 * 10, 0, 0], seq)).unwrap();
        }
        sink.close().unwrap();

        assert!(ImageSequenceSink::frame_path(&out, 3).is_file());
        assert!(out.join("frame_000007.png").is_file());

        let mut source = ImageFileSource::new();
        assert_eq!(source.open(&out).unwrap().total_frames, Some(3));
        let reds: Vec<u8> = source.frames().map(|f| f.unwrap().pixel(0, 0)[0]).collect();
        assert_eq!(reds, vec![0, 30, 70]);
    }
}
