use thiserror::Error;

/// Errors raised while building, persisting, checking or clustering an index.
///
/// `Io`, `Decode` and `Input` describe bad input from outside the process and can be
/// handled by the caller. `Corruption` means a write-once invariant was broken, which
/// only a builder defect can cause.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    Decode(#[from] bincode::Error),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("index corruption: {0}")]
    Corruption(String),

    /// A document without any term reached the builder.
    #[error("document {0:?} has no terms")]
    EmptyDocument(String),

    #[error("cannot form {k} clusters over {documents} documents")]
    InvalidClusterCount { k: usize, documents: usize },

    #[error("index has not been clustered")]
    NotClustered,
}

impl IndexError {
    pub fn corruption(msg: impl Into<String>) -> Self {
        IndexError::Corruption(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        IndexError::Input(msg.into())
    }

    /// Whether the caller can recover by supplying different input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, IndexError::Corruption(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
