#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot write in a read-only transaction")]
    ReadOnly,
    #[error("column family not found: {0}")]
    CfNotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}
