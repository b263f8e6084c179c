use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoundaryError>;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("HELM/CORE/VALIDATION/SCHEMA_MISMATCH: {0}")]
    Validation(String),

    #[error("HELM/CORE/CORE/INVALID_STATE: {0}")]
    InvalidState(String),

    #[error("HELM/CORE/RESOURCE/NOT_FOUND: no effect with id {0}")]
    NotFound(String),

    #[error(transparent)]
    Canon(#[from] helm_canon::CanonError),
}

impl BoundaryError {
    /// Wraps this error into a canonical [`helm_errors::ErrorIr`]: the
    /// boundary never lets a PDP or validation failure cross a trust
    /// boundary unwrapped.
    pub fn to_error_ir(&self, instance: &str) -> helm_errors::ErrorIr {
        match self {
            BoundaryError::Validation(detail) => {
                helm_errors::ErrorIr::new("VALIDATION", "SCHEMA_MISMATCH", "validation failed", detail, instance)
            }
            BoundaryError::InvalidState(detail) => {
                helm_errors::ErrorIr::new("CORE", "INVALID_STATE", "illegal lifecycle transition", detail, instance)
            }
            BoundaryError::NotFound(detail) => {
                helm_errors::ErrorIr::new("RESOURCE", "NOT_FOUND", "effect not found", detail, instance)
            }
            BoundaryError::Canon(err) => {
                helm_errors::ErrorIr::new("VALIDATION", "CSNF_VIOLATION", "canonicalization failed", &err.to_string(), instance)
            }
        }
    }
}
