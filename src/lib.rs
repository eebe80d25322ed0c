//! Grassfield - GPU-generated, physically displaced grass

pub mod core;
pub mod math;
pub mod render;
pub mod grass;
