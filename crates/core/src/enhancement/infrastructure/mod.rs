pub mod gfpgan_enhancer;
