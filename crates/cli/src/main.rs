use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use faceswap_core::compositing::compositor::CompositorConfig;
use faceswap_core::detection::face_analyser::AnalyserConfig;
use faceswap_core::enhancement::infrastructure::gfpgan_enhancer::EnhancerConfig;
use faceswap_core::inference::execution_provider_manager::ExecutionProviderManager;
use faceswap_core::inference::infrastructure::ort_model_loader::OrtModelLoader;
use faceswap_core::inference::model_cache::ModelCache;
use faceswap_core::mapping::face_mapper::{IdentityAssignment, MappingConfig, TargetSelection};
use faceswap_core::pipeline::frame_buffer::AdmissionPolicy;
use faceswap_core::pipeline::frame_processor::FrameProcessor;
use faceswap_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceswap_core::pipeline::swap_faces_use_case::SwapFacesUseCase;
use faceswap_core::pipeline::swap_image_use_case::SwapImageUseCase;
use faceswap_core::pipeline::swap_session::{SessionConfig, SwapSession};
use faceswap_core::shared::model_resolver;
use faceswap_core::swapping::domain::blend_mask::MouthMask;
use faceswap_core::swapping::face_swap_engine::SwapConfig;
use faceswap_core::video::domain::frame_sink::FrameSink;
use faceswap_core::video::domain::frame_source::FrameSource;
use faceswap_core::video::infrastructure::ffmpeg_frame_sink::{FfmpegFrameSink, VideoEncoderConfig};
use faceswap_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use faceswap_core::video::infrastructure::image_file_sink::{ImageFileSink, ImageSequenceSink};
use faceswap_core::video::infrastructure::image_file_source::{
    is_image_path, load_frame, ImageFileSource,
};

/// Swap faces in videos, image sequences and images.
#[derive(Parser)]
#[command(name = "faceswap")]
struct Cli {
    /// Input video, image, or directory of images.
    input: PathBuf,

    /// Output video, image, or directory for an image sequence.
    output: PathBuf,

    /// Source identity image. Repeat to map several identities.
    #[arg(long, required = true)]
    source: Vec<PathBuf>,

    /// Execution provider in preference order (cuda, tensorrt, rocm, coreml,
    /// directml, cpu). Repeatable; CPU is always the last fallback.
    #[arg(long = "execution-provider")]
    execution_provider: Vec<String>,

    /// Memory ceiling in MB for inference and frame buffering.
    #[arg(long)]
    max_memory: Option<u64>,

    /// Directory containing the ONNX models (defaults to the platform data dir).
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Restore swapped faces with the face enhancer.
    #[arg(long)]
    enhance: bool,

    /// Swap every detected face (same as --face-selection all).
    #[arg(long)]
    many_faces: bool,

    /// Which faces to swap: primary, left, right, pair, tracked, all.
    #[arg(long)]
    face_selection: Option<String>,

    /// Reverse the source order when assigning identities left to right.
    #[arg(long)]
    flip_faces: bool,

    /// Identity assignment: order or nearest.
    #[arg(long, default_value = "order")]
    assignment: String,

    /// Minimum face detection score (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f32,

    /// Blend mask feathering: larger values give a harder edge.
    #[arg(long, default_value = "8.0")]
    mask_feather_ratio: f32,

    /// Skip color matching of swapped faces to the frame.
    #[arg(long)]
    no_color_match: bool,

    /// Keep the target's own mouth instead of the swapped one.
    #[arg(long)]
    mouth_mask: bool,

    /// Width and upward reach of the kept mouth region, in mouth widths.
    #[arg(long, default_value = "1.0")]
    mouth_mask_size: f32,

    /// How far below the mouth the kept region reaches, in mouth widths.
    #[arg(long, default_value = "0.5")]
    mouth_mask_down_size: f32,

    /// Copy the input video's audio into the output.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    keep_audio: bool,

    /// H.264 constant rate factor (0-51, lower is better).
    #[arg(long, default_value = "18")]
    video_quality: u8,

    /// Drop frames when inference falls behind instead of processing every
    /// frame.
    #[arg(long)]
    realtime: bool,

    /// Frames the pipeline may hold at once (overrides --max-memory sizing).
    #[arg(long)]
    max_buffered_frames: Option<usize>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let models_dir = match &cli.models_dir {
        Some(dir) => dir.clone(),
        None => model_resolver::default_models_dir()?,
    };
    log::info!("Models directory: {}", models_dir.display());

    let manager = ExecutionProviderManager::ort();
    let cache = Arc::new(ModelCache::new(Box::new(OrtModelLoader::new(
        models_dir.clone(),
    ))));
    let session = SwapSession::new(session_config(&cli)?, &manager, Arc::clone(&cache), models_dir);

    let source_frames = cli
        .source
        .iter()
        .zip(0u64..)
        .map(|(path, seq)| load_frame(path, seq))
        .collect::<Result<Vec<_>, _>>()?;
    let sources = session.source_identities(&source_frames)?;
    log::info!("Loaded {} source identities", sources.len());
    let processor = session.processor(sources)?;

    if is_image_path(&cli.input) {
        run_image_swap(&cli.input, &cli.output, processor)?;
    } else {
        let encoder = VideoEncoderConfig {
            keep_audio: cli.keep_audio,
            crf: cli.video_quality,
        };
        run_stream_swap(
            &cli.input,
            &cli.output,
            processor,
            &session,
            encoder,
            cli.realtime,
        )?;
    }

    let released = cache.release_unused();
    log::debug!("Released {released} cached model(s)");
    Ok(())
}

fn run_image_swap(
    input: &Path,
    output: &Path,
    processor: FrameProcessor,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut use_case =
        SwapImageUseCase::new(Box::new(processor), Box::new(StdoutPipelineLogger::default()));
    let outcome = use_case.execute(
        &mut ImageFileSource::new(),
        &mut ImageFileSink::new(),
        input,
        output,
    )?;
    log::info!(
        "Swapped {} face(s), skipped {}; output written to {}",
        outcome.faces_swapped,
        outcome.faces_skipped,
        output.display()
    );
    Ok(())
}

fn run_stream_swap(
    input: &Path,
    output: &Path,
    processor: FrameProcessor,
    session: &SwapSession,
    encoder: VideoEncoderConfig,
    realtime: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let source: Box<dyn FrameSource> = if input.is_dir() {
        Box::new(ImageFileSource::new())
    } else {
        Box::new(FfmpegFrameSource::new())
    };
    let sink: Box<dyn FrameSink> = if writes_image_sequence(output) {
        Box::new(ImageSequenceSink::new())
    } else {
        Box::new(FfmpegFrameSink::with_config(encoder))
    };
    let admission = if realtime {
        AdmissionPolicy::DropOldest
    } else {
        AdmissionPolicy::Block
    };

    let use_case = SwapFacesUseCase::new(
        source,
        sink,
        Box::new(processor),
        Box::new(StdoutPipelineLogger::default()),
        session.scheduler_config(None, admission),
    );
    let report = use_case.execute(input, output)?;
    log::info!(
        "{} frames written ({} dropped), {} face(s) swapped, {} skipped; output: {}",
        report.frames_emitted,
        report.frames_dropped,
        report.faces_swapped,
        report.faces_skipped,
        output.display()
    );
    Ok(())
}

fn session_config(cli: &Cli) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    Ok(SessionConfig {
        execution_providers: cli.execution_provider.clone(),
        memory_limit_mb: cli.max_memory,
        analyser: AnalyserConfig {
            min_score: cli.confidence,
            ..AnalyserConfig::default()
        },
        mapping: MappingConfig {
            selection: target_selection(cli)?,
            assignment: IdentityAssignment::parse(&cli.assignment)
                .ok_or_else(|| format!("Unknown assignment '{}'", cli.assignment))?,
            flip: cli.flip_faces,
            ..MappingConfig::default()
        },
        swap: SwapConfig {
            mask_feather_ratio: cli.mask_feather_ratio,
            mouth_mask: cli.mouth_mask.then_some(MouthMask {
                size: cli.mouth_mask_size,
                down_size: cli.mouth_mask_down_size,
            }),
            ..SwapConfig::default()
        },
        enhancer: cli.enhance.then(EnhancerConfig::default),
        compositor: CompositorConfig {
            color_match: !cli.no_color_match,
            ..CompositorConfig::default()
        },
        max_buffered_frames: cli.max_buffered_frames,
    })
}

fn target_selection(cli: &Cli) -> Result<TargetSelection, Box<dyn std::error::Error>> {
    match (&cli.face_selection, cli.many_faces) {
        (None, false) => Ok(TargetSelection::default()),
        (None, true) => Ok(TargetSelection::All),
        (Some(name), many) => {
            let selection = TargetSelection::parse(name)
                .ok_or_else(|| format!("Unknown face selection '{name}'"))?;
            if many && selection != TargetSelection::All {
                return Err(format!("--many-faces conflicts with --face-selection {selection}").into());
            }
            Ok(selection)
        }
    }
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input not found: {}", cli.input.display()).into());
    }
    for source in &cli.source {
        if !source.is_file() {
            return Err(format!("Source image not found: {}", source.display()).into());
        }
        if !is_image_path(source) {
            return Err(format!("Source must be an image: {}", source.display()).into());
        }
    }
    if is_image_path(&cli.input) && !is_image_path(&cli.output) {
        return Err(format!(
            "Image input needs an image output path, got {}",
            cli.output.display()
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !cli.mask_feather_ratio.is_finite() || cli.mask_feather_ratio <= 0.0 {
        return Err(format!(
            "Mask feather ratio must be positive, got {}",
            cli.mask_feather_ratio
        )
        .into());
    }
    for (name, value) in [
        ("Mouth mask size", cli.mouth_mask_size),
        ("Mouth mask down size", cli.mouth_mask_down_size),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be zero or positive, got {value}").into());
        }
    }
    if cli.video_quality > 51 {
        return Err(format!("Video quality must be 0-51, got {}", cli.video_quality).into());
    }
    if cli.max_memory == Some(0) {
        return Err("Max memory must be at least 1 MB".into());
    }
    if cli.max_buffered_frames == Some(0) {
        return Err("Max buffered frames must be at least 1".into());
    }
    target_selection(cli)?;
    if IdentityAssignment::parse(&cli.assignment).is_none() {
        return Err(format!(
            "Assignment must be 'order' or 'nearest', got '{}'",
            cli.assignment
        )
        .into());
    }
    Ok(())
}

/// Outputs without an extension, or existing directories, receive PNG
/// frames instead of an encoded video.
fn writes_image_sequence(output: &Path) -> bool {
    output.is_dir() || output.extension().is_none()
}
