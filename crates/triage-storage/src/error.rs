use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// The database was opened without a column family this build expects
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// A stored key did not parse back into its parts
    #[error("Malformed key: {0}")]
    Key(String),

    /// A stored value did not decode
    #[error("Undecodable value: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl StorageError {
    /// The store was busy or timed out; the same call may succeed later.
    pub fn is_transient(&self) -> bool {
        use rocksdb::ErrorKind;
        match self {
            StorageError::RocksDb(e) => matches!(
                e.kind(),
                ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain | ErrorKind::Incomplete
            ),
            _ => false,
        }
    }

    /// Persisted bytes could not be trusted.
    pub fn is_corruption(&self) -> bool {
        match self {
            StorageError::RocksDb(e) => matches!(e.kind(), rocksdb::ErrorKind::Corruption),
            StorageError::Key(_) | StorageError::Serialization(_) => true,
            StorageError::ColumnFamilyNotFound(_) => false,
        }
    }
}
