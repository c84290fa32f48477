use std::path::PathBuf;

use thiserror::Error;

use crate::providers::ProviderError;

pub type Result<T> = std::result::Result<T, GenError>;

#[derive(Debug, Error)]
pub enum GenError {
    #[error("API key required: pass --api-key or set {0}")]
    MissingApiKey(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("image error for {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("model request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("no image generated in model response")]
    NoImage,
}

impl GenError {
    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        GenError::Image { path: path.into(), source }
    }
}
