use thiserror::Error;

/// Every failure the toolkit can surface.
///
/// Callers usually match on the variant; the messages keep stable substrings
/// (`"transaction failed"`, `"not registered"`, `"not exists"`) for logs and
/// for clients that only see the text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Unknown aggregate or stream.
    #[error("{0} not found")]
    NotFound(String),

    /// Optimistic concurrency failure: the caller assumed `expected` but the
    /// stored header is at `actual`.
    #[error("{stream} transaction failed, current version is {expected}, but stored is {actual}")]
    Conflict {
        stream: String,
        expected: u64,
        actual: u64,
    },

    #[error("command handler for {0} not exists")]
    MissingHandler(String),

    #[error("type {0} is not registered")]
    UnregisteredType(String),

    #[error("type {0} already registered")]
    AlreadyRegistered(String),

    /// Business rule rejection raised by a command handler.
    #[error("{0}")]
    Validation(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("transport failed: {0}")]
    Transport(String),

    /// The storage engine could not be opened.
    #[error("storage unavailable: {0}")]
    StorageFatal(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("already subscribed")]
    AlreadySubscribed,

    #[error("not subscribed")]
    NotSubscribed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<bitcode::Error> for Error {
    fn from(err: bitcode::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}

impl From<redb::Error> for Error {
    fn from(err: redb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
