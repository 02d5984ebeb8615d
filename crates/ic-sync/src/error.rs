use thiserror::Error;

/// Failure reported by an external store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The native engine refused a batch. The whole batch is rejected.
    #[error("rule {id} rejected: {reason}")]
    Rejected { id: i32, reason: String },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid stored data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Backend(String),
}

/// Failure of one synchronization run. The store is left empty.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read installed rules: {0}")]
    Read(#[source] StoreError),

    #[error("failed to remove installed rules: {0}")]
    Remove(#[source] StoreError),

    #[error("failed to load profiles: {0}")]
    Profiles(#[source] StoreError),

    #[error("failed to install {count} rules: {source}")]
    Install {
        count: usize,
        #[source]
        source: StoreError,
    },
}
