use std::path::PathBuf;

use crate::error::{CoverError, Result};
use crate::{CoverProvider, GenerationRequest};

/// Observer told about a primary failure before the secondary is tried.
/// Its outcome never changes control flow.
pub type ErrorReporter = Box<dyn Fn(&CoverError) + Send + Sync>;

/// Tries `primary` once and, if it fails for any reason, `secondary` once.
pub struct FallbackProvider {
    name: String,
    primary: Box<dyn CoverProvider>,
    secondary: Box<dyn CoverProvider>,
    reporter: Option<ErrorReporter>,
}

impl FallbackProvider {
    pub fn new<P, S>(primary: P, secondary: S) -> Self
    where
        P: CoverProvider + 'static,
        S: CoverProvider + 'static,
    {
        Self::from_boxed(Box::new(primary), Box::new(secondary))
    }

    pub fn from_boxed(primary: Box<dyn CoverProvider>, secondary: Box<dyn CoverProvider>) -> Self {
        let name = format!("{}->{}", primary.name(), secondary.name());
        Self {
            name,
            primary,
            secondary,
            reporter: None,
        }
    }

    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&CoverError) + Send + Sync + 'static,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn with_boxed_reporter(mut self, reporter: Option<ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn primary(&self) -> &dyn CoverProvider {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> &dyn CoverProvider {
        self.secondary.as_ref()
    }
}

impl std::fmt::Debug for FallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackProvider")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .field("reporter", &self.reporter.is_some())
            .finish()
    }
}

impl CoverProvider for FallbackProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, request: &GenerationRequest) -> Result<PathBuf> {
        let err = match self.primary.generate(request) {
            Ok(path) => return Ok(path),
            Err(err) => err,
        };

        tracing::warn!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            error = %err,
            "primary cover provider failed; trying fallback"
        );
        if let Some(reporter) = self.reporter.as_ref() {
            reporter(&err);
        }

        self.secondary.generate(request)
    }
}
