//! Error types for the grass simulation

use thiserror::Error;

use crate::grass::params::ParamKind;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown device parameter `{name}`")]
    UnknownParameter { name: String },

    #[error("Device parameter `{name}` is {found:?}, binding expects {expected:?}")]
    ParameterKind {
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
