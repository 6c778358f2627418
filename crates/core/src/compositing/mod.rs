pub mod color_transfer;
pub mod compositor;
