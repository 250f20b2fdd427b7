use std::fmt;

/// What went wrong, independent of where it was reported from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("malformed document: {0}")]
    Parse(String),
    #[error("unsupported primitive topology: {0}")]
    UnsupportedTopology(String),
    #[error("missing vertex attribute: {0}")]
    MissingAttribute(&'static str),
    #[error("attribute count mismatch: {0}")]
    AttributeCountMismatch(String),
    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),
    #[error("missing image data: {0}")]
    MissingImageData(String),
    #[error("invalid material index: {0}")]
    InvalidMaterialIndex(String),
    #[error("cyclic scene graph at node {0}")]
    CyclicSceneGraph(usize),
    #[error("gpu allocation failed: {0}")]
    AllocationFailed(String),
}

/// An error kind plus the trace of messages appended while it travelled up
/// the call chain. The first entry is the innermost context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub trace: Vec<String>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse(msg.into()))
    }

    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AllocationFailed(msg.into()))
    }

    /// Appends a message and hands the error back, for use in `map_err`.
    pub fn propagate(mut self, msg: impl Into<String>) -> Self {
        self.trace.push(msg.into());
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for line in &self.trace {
            write!(f, "\n  at: {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Lazy variant of [`ResultExt::context`] for messages that need formatting.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().propagate(msg))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().propagate(f()))
    }
}
