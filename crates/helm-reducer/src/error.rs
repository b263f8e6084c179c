use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReducerError>;

#[derive(Debug, Error)]
pub enum ReducerError {
    #[error("unknown conflict policy string: {0}")]
    UnknownPolicy(String),

    /// `quorum` is a reserved wire value with no algorithm defined yet;
    /// accepted as a literal but not executable.
    #[error("conflict policy 'quorum' has no defined reduction algorithm")]
    QuorumNotImplemented,
}
