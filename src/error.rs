use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The subgraph request failed. `offset` is the `skip` of the page that
    /// failed; `pages_committed` pages of this run are already durable.
    #[error("subgraph fetch failed at offset {offset} after {pages_committed} committed page(s): {message}")]
    UpstreamFetch {
        offset: usize,
        pages_committed: usize,
        message: String,
    },

    /// A page was fetched but could not be written. Earlier pages of the run
    /// stay committed; `source` is the store error that aborted this page.
    #[error("sync aborted writing the page at offset {offset} after {pages_committed} committed page(s): {source}")]
    SyncAborted {
        offset: usize,
        pages_committed: usize,
        #[source]
        source: Box<CacheError>,
    },

    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// A write violated a uniqueness or foreign-key constraint. The enclosing
    /// transaction has been rolled back.
    #[error("store integrity violation: {0}")]
    StoreIntegrity(String),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid embedding blob: {0} bytes is not a multiple of 4")]
    InvalidBlob(usize),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => {
                CacheError::StoreIntegrity(err.to_string())
            }
            _ => CacheError::Storage(err),
        }
    }
}

impl CacheError {
    /// Attaches sync progress to an upstream failure raised by a source that
    /// only knows its own offset.
    pub fn with_pages_committed(self, committed: usize) -> Self {
        match self {
            CacheError::UpstreamFetch {
                offset, message, ..
            } => CacheError::UpstreamFetch {
                offset,
                pages_committed: committed,
                message,
            },
            other => other,
        }
    }

    /// Wraps a store failure with the position of the page that hit it.
    pub fn sync_aborted(self, offset: usize, pages_committed: usize) -> Self {
        CacheError::SyncAborted {
            offset,
            pages_committed,
            source: Box::new(self),
        }
    }
}
