pub mod domain;
pub mod frame_buffer;
pub mod frame_processor;
pub mod frame_scheduler;
pub mod pipeline_logger;
pub mod session_control;
pub mod swap_faces_use_case;
pub mod swap_image_use_case;
pub mod swap_session;
