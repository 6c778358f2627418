use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

type BoxError = Box<dyn std::error::Error>;

/// Reads a single image, or a directory of images in file-name order, as
/// a frame stream with `fps = 0`.
///
/// Every image in a directory must share the first image's dimensions.
pub struct ImageFileSource {
    paths: Vec<PathBuf>,
    dimensions: Option<(u32, u32)>,
}

impl ImageFileSource {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            dimensions: None,
        }
    }
}

impl Default for ImageFileSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes an image file into an RGB frame.
pub fn load_frame(path: &Path, sequence: u64) -> Result<Frame, BoxError> {
    let img = image::open(path)
        .map_err(|e| format!("{}: {e}", path.display()))?
        .into_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, sequence))
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, BoxError> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image_path(p))
        .collect();
    paths.sort();
    Ok(paths)
}

impl FrameSource for ImageFileSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        let paths = if path.is_dir() {
            list_images(path)?
        } else {
            vec![path.to_path_buf()]
        };
        let first = paths
            .first()
            .ok_or_else(|| format!("no images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| format!("{}: {e}", first.display()))?;

        let metadata = VideoMetadata {
            width,
            height,
            fps: 0.0,
            total_frames: Some(paths.len()),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = paths;
        self.dimensions = Some((width, height));
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        let Some(expected) = self.dimensions else {
            return Box::new(std::iter::once(Err("ImageFileSource: not opened".into())));
        };
        Box::new(self.paths.iter().zip(0u64..).map(move |(path, sequence)| {
            let frame = load_frame(path, sequence)?;
            if (frame.width(), frame.height()) != expected {
                return Err(format!(
                    "{} is {}x{}, expected {}x{}",
                    path.display(),
                    frame.width(),
                    frame.height(),
                    expected.0,
                    expected.1
                )
                .into());
            }
            Ok(frame)
        }))
    }

    fn close(&mut self) {
        self.paths.clear();
        self.dimensions = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn save(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_single_image_is_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        save(&path, 8, 6, [10, 20, 30]);

        let mut source = ImageFileSource::new();
        let meta = source.open(&path).unwrap();
        assert_eq!((meta.width, meta.height, meta.total_frames), (8, 6, Some(1)));

        let frames: Vec<Frame> = source.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].pixel(7, 5), [10, 20, 30]);
        assert_eq!(frames[0].sequence(), 0);
    }

    #[test]
    fn test_directory_read_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("b.png"), 4, 4, [2, 2, 2]);
        save(&dir.path().join("a.png"), 4, 4, [1, 1, 1]);
        save(&dir.path().join("c.png"), 4, 4, [3, 3, 3]);
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut source = ImageFileSource::new();
        assert_eq!(source.open(dir.path()).unwrap().total_frames, Some(3));
        let firsts: Vec<(u64, u8)> = source
            .frames()
            .map(|f| f.unwrap())
            .map(|f| (f.sequence(), f.pixel(0, 0)[0]))
            .collect();
        assert_eq!(firsts, vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        save(&dir.path().join("a.png"), 4, 4, [0, 0, 0]);
        save(&dir.path().join("b.png"), 5, 4, [0, 0, 0]);

        let mut source = ImageFileSource::new();
        source.open(dir.path()).unwrap();
        let results: Vec<_> = source.frames().collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageFileSource::new().open(dir.path()).is_err());
    }

    #[test]
    fn test_frames_before_open_error() {
        let mut source = ImageFileSource::new();
        assert!(source.frames().next().unwrap().is_err());
    }

    #[rstest]
    #[case("a.jpg", true)]
    #[case("a.JPEG", true)]
    #[case("a.webp", true)]
    #[case("a.mp4", false)]
    #[case("noext", false)]
    fn test_is_image_path(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image_path(Path::new(name)), expected);
    }
}
