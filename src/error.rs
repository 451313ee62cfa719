use thiserror::Error;

/// Errors surfaced by a request handler.
///
/// Every failure a transport layer can see is one of these three kinds.
/// Parameter errors always name the offending parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImageError {
    /// A required parameter is missing, malformed, or fails validation
    #[error("invalid parameter \"{param}\": {message}")]
    Param { param: String, message: String },

    /// The origin fetch failed
    #[error("source error: {message}")]
    Source { message: String },

    /// A transform, decode or encode collaborator failed
    #[error("processing error: {message}")]
    Processing { message: String },
}

/// Coarse error classification, for mapping to protocol-specific responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Param,
    Source,
    Processing,
}

impl ImageError {
    /// Create a parameter error.
    pub fn param(param: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::Param {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Create a source error.
    pub fn source_error(message: impl Into<String>) -> Self {
        ImageError::Source {
            message: message.into(),
        }
    }

    /// Create a processing error.
    pub fn processing(message: impl Into<String>) -> Self {
        ImageError::Processing {
            message: message.into(),
        }
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::Param { .. } => ErrorKind::Param,
            ImageError::Source { .. } => ErrorKind::Source,
            ImageError::Processing { .. } => ErrorKind::Processing,
        }
    }

    /// Name of the offending parameter, for parameter errors.
    pub fn param_name(&self) -> Option<&str> {
        match self {
            ImageError::Param { param, .. } => Some(param),
            _ => None,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ImageError::Param { message, .. }
            | ImageError::Source { message }
            | ImageError::Processing { message } => message,
        }
    }

    /// Prefix the message with diagnostic context.
    ///
    /// The variant and parameter name are preserved.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            ImageError::Param { param, message } => ImageError::Param {
                param,
                message: format!("{}: {}", context, message),
            },
            ImageError::Source { message } => ImageError::Source {
                message: format!("{}: {}", context, message),
            },
            ImageError::Processing { message } => ImageError::Processing {
                message: format!("{}: {}", context, message),
            },
        }
    }
}

/// Errors from a cache backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The backend failed to store or retrieve an entry
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A stored entry could not be decoded
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Errors from an origin fetch capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The identifier does not name an existing object
    #[error("not found: {0}")]
    NotFound(String),

    /// Transfer, connection, or permission failure
    #[error("transfer error: {0}")]
    Transfer(String),
}

/// Errors from a format detection capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("unknown image format: {0}")]
    UnknownFormat(String),
}

/// Construction-time configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A recognized option holds an unusable value
    #[error("invalid value for {option}: {message}")]
    InvalidValue {
        option: &'static str,
        message: String,
    },

    /// A byte size string could not be parsed
    #[error("invalid size \"{0}\": expected bytes or a KB/MB/GB suffix, greater than zero")]
    InvalidSize(String),
}

impl From<FetchError> for ImageError {
    fn from(err: FetchError) -> Self {
        ImageError::source_error(err.to_string())
    }
}
