//! Error types and result definitions for warehouse load operations.
//!
//! Provides an error system with classification and captured diagnostic metadata
//! for load-engine operations. Every error carries an [`ErrorKind`], and each kind
//! maps to a [`Severity`] that decides whether the offending row is quarantined or
//! the whole run aborts.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for load operations using [`LoadError`] as the error type.
pub type LoadResult<T> = Result<T, LoadError>;

/// How an error affects the run that observed it.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Severity {
    /// The offending row is quarantined, counted, and the batch continues.
    Row,
    /// The run aborts before any dependent stage begins.
    Fatal,
}

/// Specific categories of errors that can occur during a warehouse load.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Extraction errors.
    SnapshotMissing,
    SnapshotMalformed,

    // Row-level data errors.
    Validation,
    UnresolvedReference,

    // Surrogate key management errors.
    KeyAllocation,

    // Persistence errors.
    StoreUnavailable,
    StoreWriteFailed,

    // Run state errors.
    InvalidState,
    Config,
}

impl ErrorKind {
    /// Returns the [`Severity`] this kind carries.
    ///
    /// Only data errors scoped to a single staging row are survivable; everything
    /// else must stop the run before dependent stages observe partial state.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Validation | ErrorKind::UnresolvedReference => Severity::Row,
            _ => Severity::Fatal,
        }
    }
}

/// Detailed payload stored for a [`LoadError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for warehouse load operations.
///
/// [`LoadError`] pairs a static description with an [`ErrorKind`] for
/// classification, an optional dynamic detail (row keys, file paths), the
/// callsite location, and an optional source error.
#[derive(Debug, Clone)]
pub struct LoadError {
    payload: ErrorPayload,
}

impl LoadError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the [`Severity`] of this error.
    pub fn severity(&self) -> Severity {
        self.payload.kind.severity()
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance. The stored source is exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`LoadError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        LoadError {
            payload: ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
            },
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let location = self.payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.payload.kind,
            self.payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        if let Some(detail) = self.payload.detail.as_deref() {
            write!(f, "\n  Detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source as &(dyn error::Error + 'static))
    }
}

/// Creates a [`LoadError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for LoadError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`LoadError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for LoadError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> LoadError {
        LoadError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts [`serde_json::Error`] to [`LoadError`] with [`ErrorKind::SnapshotMalformed`].
///
/// JSON decoding only happens while reading staging snapshots or reloading
/// persisted warehouse rows, both of which are structural failures.
impl From<serde_json::Error> for LoadError {
    #[track_caller]
    fn from(err: serde_json::Error) -> LoadError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoadError::from_components(
            ErrorKind::SnapshotMalformed,
            Cow::Borrowed("JSON decoding failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}

/// Converts [`chrono::ParseError`] to [`LoadError`] with [`ErrorKind::Validation`].
impl From<chrono::ParseError> for LoadError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> LoadError {
        let detail = err.to_string();
        let source = Arc::new(err);
        LoadError::from_components(
            ErrorKind::Validation,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(source),
        )
    }
}
