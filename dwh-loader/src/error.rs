use std::error::Error;
use std::fmt;

use dwh::error::LoadError;

/// Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Error type for the loader service.
///
/// Wraps [`LoadError`] for pipeline errors and provides a variant for
/// startup/configuration errors.
#[derive(Debug)]
pub enum LoaderError {
    /// Pipeline or load-engine error.
    Load(LoadError),
    /// Configuration or startup error.
    Config(Box<dyn Error + Send + Sync>),
}

impl LoaderError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            LoaderError::Load(_) => "load error",
            LoaderError::Config(_) => "configuration error",
        }
    }

    /// Creates a configuration error from any boxed source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        LoaderError::Config(Box::new(err))
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::Load(err) => write!(f, "{}: {err}", self.category()),
            LoaderError::Config(err) => write!(f, "{}: {err}", self.category()),
        }
    }
}

impl Error for LoaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoaderError::Load(err) => Some(err),
            LoaderError::Config(err) => Some(err.as_ref()),
        }
    }
}

impl From<LoadError> for LoaderError {
    fn from(err: LoadError) -> Self {
        LoaderError::Load(err)
    }
}
