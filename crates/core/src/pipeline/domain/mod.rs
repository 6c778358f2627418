pub mod frame_stage;
pub mod session_state;
