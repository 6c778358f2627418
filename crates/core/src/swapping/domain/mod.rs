pub mod blend_mask;
