use thiserror::Error;

/// Boxed error raised by a backend while retrieving raw values.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by drivers and facades. Coercion and defaulting never fail.
#[derive(Debug, Error)]
pub enum Error {
    /// Value was empty (absent, null or "") after defaulting in an `assert_get_*` call.
    #[error("feature manager assertion failed: no value for key `{key}`")]
    Assertion { key: String },

    /// Backend failure, carried unchanged.
    #[error(transparent)]
    Driver(BoxError),

    /// Read attempted after the driver was closed.
    #[error("driver has been closed")]
    Closed,

    /// JSON text could not be read as a flag mapping (or written as output).
    #[error("invalid JSON configuration: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a backend error without altering it.
    pub fn driver<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::Driver(err.into())
    }

    // Used by callers that map assertion failures to their own exit path.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion { .. })
    }
}

// Alias used across drivers and facades.
pub type Result<T> = std::result::Result<T, Error>;
