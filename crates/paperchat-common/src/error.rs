use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// A required request field is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A query arrived before any document was indexed in this process.
    #[error("Document not uploaded or processed yet.")]
    NoDocumentIndexed,

    /// Document loading, splitting, or embedding failed.
    #[error("{0}")]
    Indexing(String),

    /// The hosted chat-completion call failed.
    #[error("{0}")]
    Answer(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
