use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CoverError>;

#[derive(Debug, thiserror::Error)]
pub enum CoverError {
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{provider} provider error: {message}")]
    Provider { provider: String, message: String },

    #[error("failed to create image from provided data: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode cover image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("i/o error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoverError {
    pub(crate) fn provider(provider: &str, message: impl Into<String>) -> Self {
        CoverError::Provider {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoverError::Io {
            path: path.into(),
            source,
        }
    }
}
