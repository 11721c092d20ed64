//! Turns a gameplay screenshot into a 16:9 YouTube cover by delegating to an
//! external image-generation provider and normalizing what comes back.

use std::path::PathBuf;

pub mod error;
pub mod factory;
pub mod fallback;
pub mod normalize;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use error::{CoverError, Result};
pub use factory::{build_from_config, build_primary_from_config, create_gemini, create_openai};
pub use fallback::{ErrorReporter, FallbackProvider};
pub use normalize::{cover_height, mime_type_for, ImageNormalizer};
pub use providers::gemini::GeminiProvider;
pub use providers::openai::OpenAiProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub image_path: PathBuf,
    pub game_name: String,
    pub description: String,
}

impl GenerationRequest {
    pub fn new(
        image_path: impl Into<PathBuf>,
        game_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            game_name: game_name.into(),
            description: description.into(),
        }
    }
}

/// Anything that can turn a [`GenerationRequest`] into a cover file on disk.
pub trait CoverProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the absolute path of the saved cover.
    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf>;
}

impl<P: CoverProvider + ?Sized> CoverProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf> {
        (**self).generate(request)
    }
}
