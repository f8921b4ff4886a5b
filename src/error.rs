use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuiverError {
    // Query validation errors
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unknown field {field} in collection {collection}")]
    UnknownField { collection: String, field: String },

    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    // Transient index state
    #[error("index on field {field} is unavailable (build in progress)")]
    IndexUnavailable { field: String },

    // Execution errors
    #[error("query cancelled")]
    Cancelled,

    #[error("query concurrency limit reached, try again later")]
    QueryConcurrencyExhausted,

    #[error("query task failed: {0}")]
    Execution(String),

    // Index build errors
    #[error("index error: {0}")]
    Index(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, QuiverError>;

impl QuiverError {
    /// Shorthand for building an `InvalidQuery` from anything printable.
    pub fn invalid(msg: impl Into<String>) -> Self {
        QuiverError::InvalidQuery(msg.into())
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuiverError::IndexUnavailable { .. } | QuiverError::QueryConcurrencyExhausted
        )
    }

    /// Short stable label, used as the `kind` metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            QuiverError::InvalidQuery(_) => "invalid_query",
            QuiverError::UnknownField { .. } => "unknown_field",
            QuiverError::CollectionNotFound { .. } => "collection_not_found",
            QuiverError::IndexUnavailable { .. } => "index_unavailable",
            QuiverError::Cancelled => "cancelled",
            QuiverError::QueryConcurrencyExhausted => "concurrency_exhausted",
            QuiverError::Execution(_) => "execution",
            QuiverError::Index(_) => "index",
            QuiverError::Config(_) => "config",
        }
    }
}
