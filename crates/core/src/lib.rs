pub mod compositing;
pub mod detection;
pub mod enhancement;
pub mod inference;
pub mod mapping;
pub mod pipeline;
pub mod shared;
pub mod swapping;
pub mod video;
