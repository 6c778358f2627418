use std::path::{Path, PathBuf};

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, encoder, format, media, Dictionary, Packet, Rational};
use log::{info, warn};

use crate::shared::frame::{Frame, CHANNELS};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::frame_sink::FrameSink;

/// Highest (worst) H.264 constant rate factor.
const MAX_CRF: u8 = 51;

#[derive(Clone, Debug, PartialEq)]
pub struct VideoEncoderConfig {
    /// Copy the source's audio streams into the output.
    pub keep_audio: bool,
    /// H.264 constant rate factor, 0 (lossless) to 51. MPEG-4 output maps
    /// it onto a fixed quantizer.
    pub crf: u8,
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        Self {
            keep_audio: true,
            crf: 18,
        }
    }
}

/// Encodes frames to a video file with ffmpeg-next.
///
/// H.264 (libx264) is preferred; MPEG-4 Part 2 is used when no H.264
/// encoder is available or it rejects the stream. On close, audio from
/// the source file is remuxed into the output when `keep_audio` is set.
pub struct FfmpegFrameSink {
    config: VideoEncoderConfig,
    encoding: Option<Encoding>,
    audio_from: Option<PathBuf>,
}

struct Encoding {
    octx: format::context::Output,
    encoder: codec::encoder::video::Encoder,
    scaler: scaling::Context,
    path: PathBuf,
    codec_name: String,
    width: u32,
    height: u32,
    time_base: Rational,
    pts: i64,
}

// Safety: the sink is moved to the output thread and used only there.
// The raw pointers inside ffmpeg types are never shared across threads.
unsafe impl Send for FfmpegFrameSink {}

impl FfmpegFrameSink {
    pub fn new() -> Self {
        Self::with_config(VideoEncoderConfig::default())
    }

    pub fn with_config(config: VideoEncoderConfig) -> Self {
        Self {
            config,
            encoding: None,
            audio_from: None,
        }
    }

    /// Name of the encoder in use, once opened.
    pub fn codec_name(&self) -> Option<&str> {
        self.encoding.as_ref().map(|enc| enc.codec_name.as_str())
    }
}

impl Default for FfmpegFrameSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FfmpegFrameSink {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let mut octx = format::output(path)?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);
        let fps = metadata.output_fps();

        let (codec, encoder) = open_encoder(metadata, fps, global_header, self.config.crf)?;
        let mut ost = octx.add_stream(Some(codec))?;
        ost.set_parameters(&encoder);
        octx.write_header()?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            metadata.width,
            metadata.height,
            scaling::Flags::BILINEAR,
        )?;

        let codec_name = codec.name().to_string();
        info!(
            "Encoding {}x{} at {fps} fps with {codec_name} to {}",
            metadata.width,
            metadata.height,
            path.display()
        );
        self.audio_from = if self.config.keep_audio {
            metadata.source_path.clone().filter(|p| p.is_file())
        } else {
            None
        };
        self.encoding = Some(Encoding {
            octx,
            encoder,
            scaler,
            path: path.to_path_buf(),
            codec_name,
            width: metadata.width,
            height: metadata.height,
            time_base: Rational(1, fps),
            pts: 0,
        });
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let enc = self.encoding.as_mut().ok_or("FfmpegFrameSink: not opened")?;
        if frame.width() != enc.width || frame.height() != enc.height {
            return Err(format!(
                "frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                enc.width,
                enc.height
            )
            .into());
        }

        let mut rgb = Video::new(Pixel::RGB24, enc.width, enc.height);
        let stride = rgb.stride(0);
        let row_len = enc.width as usize * CHANNELS;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut yuv = Video::empty();
        enc.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(enc.pts));
        enc.pts += 1;

        enc.encoder.send_frame(&yuv)?;
        enc.drain_packets()
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut enc) = self.encoding.take() else {
            return Ok(());
        };
        enc.encoder.send_eof()?;
        enc.drain_packets()?;
        enc.octx.write_trailer()?;
        let path = enc.path.clone();
        drop(enc);

        if let Some(source) = self.audio_from.take() {
            if let Err(e) = mux_audio(&source, &path) {
                warn!("Audio muxing failed: {e}");
            }
        }
        Ok(())
    }
}

impl Encoding {
    fn drain_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.time_base, stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

/// Opens the first encoder that accepts the stream, H.264 before MPEG-4.
fn open_encoder(
    metadata: &VideoMetadata,
    fps: i32,
    global_header: bool,
    crf: u8,
) -> Result<(codec::Codec, codec::encoder::video::Encoder), Box<dyn std::error::Error>> {
    let candidates = [
        encoder::find_by_name("libx264").or_else(|| encoder::find(codec::Id::H264)),
        encoder::find(codec::Id::MPEG4),
    ];
    let mut last_error: Option<Box<dyn std::error::Error>> = None;

    for codec in candidates.into_iter().flatten() {
        let mut ctx = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        ctx.set_width(metadata.width);
        ctx.set_height(metadata.height);
        ctx.set_format(Pixel::YUV420P);
        ctx.set_time_base(Rational(1, fps));
        ctx.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        match ctx.open_with(encoder_options(codec.id(), crf)) {
            Ok(encoder) => return Ok((codec, encoder)),
            Err(e) => {
                warn!("{} encoder unavailable: {e}", codec.name());
                last_error = Some(e.into());
            }
        }
    }
    Err(last_error.unwrap_or_else(|| "no H.264 or MPEG-4 encoder found".into()))
}

fn encoder_options(id: codec::Id, crf: u8) -> Dictionary<'static> {
    let crf = crf.min(MAX_CRF);
    let mut options = Dictionary::new();
    if id == codec::Id::H264 {
        options.set("crf", &crf.to_string());
        options.set("preset", "medium");
    } else {
        let q = mpeg4_quantizer(crf).to_string();
        options.set("qmin", &q);
        options.set("qmax", &q);
    }
    options
}

/// Maps a CRF (0..=51) onto the MPEG-4 quantizer range 2..=31.
fn mpeg4_quantizer(crf: u8) -> u32 {
    2 + (crf.min(MAX_CRF) as u32 * 29 + MAX_CRF as u32 / 2) / MAX_CRF as u32
}

/// Copies audio from `source` into `video_output` by remuxing.
///
/// The video packets are copied untouched into a sibling file that then
/// replaces the output. A source without audio leaves the output as is.
fn mux_audio(source: &Path, video_output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut ictx_source = format::input(source)?;
    if ictx_source.streams().best(media::Type::Audio).is_none() {
        return Ok(());
    }
    let mut ictx_video = format::input(video_output)?;

    let ext = video_output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let temp_path = video_output.with_extension(format!("muxing.{ext}"));
    let mut octx = format::output(&temp_path)?;

    let video_map = map_streams(&ictx_video, &mut octx, media::Type::Video, 0)?;
    let first_audio = video_map.iter().flatten().count();
    let audio_map = map_streams(&ictx_source, &mut octx, media::Type::Audio, first_audio)?;
    octx.write_header()?;

    copy_packets(&mut ictx_video, &mut octx, &video_map)?;
    copy_packets(&mut ictx_source, &mut octx, &audio_map)?;
    octx.write_trailer()?;
    drop(octx);

    std::fs::rename(&temp_path, video_output)?;
    info!("Copied audio from {}", source.display());
    Ok(())
}

/// Adds an output stream per input stream of `medium`; returns the output
/// index for each input stream.
fn map_streams(
    ictx: &format::context::Input,
    octx: &mut format::context::Output,
    medium: media::Type,
    first_index: usize,
) -> Result<Vec<Option<usize>>, Box<dyn std::error::Error>> {
    let mut map = vec![None; ictx.nb_streams() as usize];
    let mut next = first_index;
    for (idx, stream) in ictx.streams().enumerate() {
        if stream.parameters().medium() != medium {
            continue;
        }
        let mut ost = octx.add_stream(encoder::find(codec::Id::None))?;
        ost.set_parameters(stream.parameters());
        // Safety: the parameters belong to the stream just added; clearing
        // the tag lets the output container choose its own.
        unsafe {
            (*ost.parameters().as_mut_ptr()).codec_tag = 0;
        }
        map[idx] = Some(next);
        next += 1;
    }
    Ok(map)
}

fn copy_packets(
    ictx: &mut format::context::Input,
    octx: &mut format::context::Output,
    map: &[Option<usize>],
) -> Result<(), Box<dyn std::error::Error>> {
    let in_time_bases: Vec<Rational> = ictx.streams().map(|s| s.time_base()).collect();
    for (stream, mut packet) in ictx.packets() {
        let ist = stream.index();
        let Some(ost) = map.get(ist).copied().flatten() else {
            continue;
        };
        let out_time_base = octx.stream(ost).ok_or("output stream missing")?.time_base();
        packet.rescale_ts(in_time_bases[ist], out_time_base);
        packet.set_position(-1);
        packet.set_stream(ost);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}
