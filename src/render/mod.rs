//! GPU context and host/device transfer helpers

pub mod context;
pub mod readback;

pub use context::GpuContext;
