use thiserror::Error;

pub type Result<T> = std::result::Result<T, ErrorsError>;

#[derive(Debug, Error)]
pub enum ErrorsError {
    #[error("invalid error code: {0}")]
    InvalidCode(String),
}
