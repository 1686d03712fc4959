use std::fmt;
use std::io;

/// Boxed error from a collaborator crate (kube, hyper, rustls, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The strategy does not apply to this address; try the next one.
    NotApplicable,
    /// Malformed input. Retrying will not help.
    BadParameter,
    /// A file, executable or API object does not exist.
    NotFound,
    /// Network or I/O failure; callers may retry.
    Transient,
    /// Malformed client configuration.
    Config,
    /// The caller's context was cancelled or its deadline passed.
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotApplicable => write!(f, "not applicable"),
            ErrorKind::BadParameter => write!(f, "bad parameter"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    NotApplicable(String),

    #[error("{0}")]
    BadParameter(String),

    #[error("{message}")]
    NotFound {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("failed to dial {network}://{addr}: {source}")]
    Dial {
        network: String,
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve {addr}: {message}")]
    Resolve { addr: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}: {source}")]
    Api {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("request failed: {0}")]
    Request(#[source] BoxError),

    #[error("{message}: {source}")]
    Config {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn not_applicable(message: impl Into<String>) -> Self {
        Error::NotApplicable(message.into())
    }

    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Error::BadParameter(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
            source: None,
        }
    }

    pub fn config(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Config {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn api(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Error::Api {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Translate an OS error, turning "not found" into [`ErrorKind::NotFound`].
    pub fn from_io(context: impl Into<String>, source: io::Error) -> Self {
        let context = context.into();
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound {
                message: format!("{}: {}", context, source),
                source: Some(source),
            }
        } else {
            Error::Io { context, source }
        }
    }

    /// Wrap with a description of the failed operation. The kind is preserved.
    pub fn context(self, message: impl Into<String>) -> Self {
        Error::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotApplicable(_) => ErrorKind::NotApplicable,
            Error::BadParameter(_) => ErrorKind::BadParameter,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Dial { .. }
            | Error::Resolve { .. }
            | Error::Io { .. }
            | Error::Api { .. }
            | Error::Request(_) => ErrorKind::Transient,
            Error::Config { .. } => ErrorKind::Config,
            Error::Cancelled | Error::DeadlineExceeded => ErrorKind::Cancelled,
            Error::Context { source, .. } => source.kind(),
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        self.kind() == ErrorKind::NotApplicable
    }

    pub fn is_bad_parameter(&self) -> bool {
        self.kind() == ErrorKind::BadParameter
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

/// Attach operation context to a fallible result.
pub trait ResultExt<T> {
    fn context(self, message: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(message))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
