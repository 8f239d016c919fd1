use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    /// Index and metadata disagree, or a corpus was requested that has no loaded backing store
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Dimension mismatch: index holds {expected}-dimensional vectors, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index format error: {0}")]
    IndexFormat(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Embedding error: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("Generation error: {0:#}")]
    Generation(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Only input errors can be fixed by the caller and retried; everything else aborts the request.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod experiments;
pub mod generation;
pub mod index;
pub mod mcp;
pub mod metadata;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_support;
