use std::path::Path;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, decoder, format, media};

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_source::FrameSource;

type BoxError = Box<dyn std::error::Error>;

/// Decodes a video file with ffmpeg-next, yielding RGB24 frames numbered
/// from zero in decode order.
pub struct FfmpegFrameSource {
    input_ctx: Option<format::context::Input>,
    video_stream_index: usize,
}

// Safety: the source is moved to the capture thread and used only there.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegFrameSource {}

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
        }
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, BoxError> {
        ffmpeg_next::init()?;

        let ictx = format::input(path)?;
        let stream = ictx
            .streams()
            .best(media::Type::Video)
            .ok_or("No video stream found")?;
        let decoder = codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let frames = stream.frames();

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames: (frames > 0).then_some(frames as usize),
            source_path: Some(path.to_path_buf()),
        };

        self.video_stream_index = stream.index();
        self.input_ctx = Some(ictx);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, BoxError>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegFrameSource: not opened".into())));
        };
        match open_decoder(ictx, self.video_stream_index) {
            Ok((decoder, scaler)) => Box::new(DecodedFrames {
                width: decoder.width(),
                height: decoder.height(),
                ictx,
                decoder,
                scaler,
                video_stream_index: self.video_stream_index,
                sequence: 0,
                flushing: false,
                done: false,
            }),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

fn open_decoder(
    ictx: &format::context::Input,
    stream_index: usize,
) -> Result<(decoder::Video, scaling::Context), BoxError> {
    let stream = ictx.stream(stream_index).ok_or("video stream disappeared")?;
    let decoder = codec::context::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;
    let scaler = scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        scaling::Flags::BILINEAR,
    )?;
    Ok((decoder, scaler))
}

/// Decodes lazily so memory stays bounded by the scheduler, not the file.
struct DecodedFrames<'a> {
    ictx: &'a mut format::context::Input,
    decoder: decoder::Video,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    sequence: u64,
    flushing: bool,
    done: bool,
}

impl DecodedFrames<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, BoxError>> {
        let mut decoded = Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }
        let pixels = packed_rgb(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, self.sequence);
        self.sequence += 1;
        Some(Ok(frame))
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = Result<Frame, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                let result = self.try_receive();
                self.done = result.is_none();
                return result;
            };
            if stream.index() != self.video_stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies an RGB24 plane into a tightly packed buffer, dropping the row
/// padding ffmpeg may add (stride > width * 3).
fn packed_rgb(rgb: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * CHANNELS;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
