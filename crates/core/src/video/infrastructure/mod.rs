pub mod ffmpeg_frame_sink;
pub mod ffmpeg_frame_source;
pub mod image_file_sink;
pub mod image_file_source;
