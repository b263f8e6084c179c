use thiserror::Error;

pub type Result<T> = std::result::Result<T, MerkleError>;

#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("path {0} is not a leaf of this document")]
    UnknownPath(String),

    #[error("cannot derive an evidence view over an empty document")]
    EmptyDocument,

    #[error("malformed content address or proof hash: {0}")]
    InvalidAddress(String),

    #[error("disclosed leaf at {0} does not match its inclusion proof")]
    InclusionMismatch(String),
}
