use tskv_types::TypeError;

/// Errors from storage driver operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The etcd cluster could not be reached or rejected the request.
    #[error("etcd {context}: {source}")]
    Unreachable {
        context: String,
        #[source]
        source: etcd_client::Error,
    },

    /// The embedded database failed.
    #[error("embedded store {context}: {source}")]
    Embedded {
        context: String,
        #[source]
        source: redb::Error,
    },

    /// The requested physical key does not exist.
    #[error("missing key {key}")]
    NotFound { key: String },

    /// Fetched bytes are neither JSON nor valid gzip data.
    #[error("cannot decode {key}: {reason}")]
    Decode { key: String, reason: String },

    /// An advisory lock is already held.
    #[error("key {key} is already locked")]
    LockHeld { key: String },

    /// The transient save lock could not be obtained in time.
    #[error("timed out acquiring save lock {key}")]
    LockTimeout { key: String },

    /// The multi-key write was not committed. None of the keys changed.
    #[error("transaction over {keys:?} was rolled back: {reason}")]
    TransactionAborted { keys: Vec<String>, reason: String },

    /// The entity failed to produce or consume its byte representation.
    #[error("entity {key}: {source}")]
    Entity {
        key: String,
        #[source]
        source: TypeError,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn etcd(context: impl Into<String>, source: etcd_client::Error) -> Self {
        Self::Unreachable {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn embedded(context: impl Into<String>, source: impl Into<redb::Error>) -> Self {
        Self::Embedded {
            context: context.into(),
            source: source.into(),
        }
    }

    /// `true` for a missing physical key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` when a lock could not be taken.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::LockHeld { .. } | Self::LockTimeout { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
