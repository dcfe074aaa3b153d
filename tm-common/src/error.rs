use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("connection busy: {0}")]
    ConnectionBusy(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("metadata error: {0}")]
    MetadataError(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("mapping error: {0}")]
    MappingError(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("transaction error: {0}")]
    TransactionError(String),

    #[error("sqlx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl Error {
    /// Errors of this kind abort the caller instead of turning into a failure sentinel.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }
}

/// Finds the typed error inside an `anyhow` chain, if any.
/// An `Error` attached as context is found before the error it wraps.
pub fn find_error(err: &anyhow::Error) -> Option<&Error> {
    err.downcast_ref::<Error>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<Error>()))
}

pub fn is_fatal(err: &anyhow::Error) -> bool {
    find_error(err).map_or(false, Error::is_fatal)
}
