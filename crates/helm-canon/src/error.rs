use thiserror::Error;

pub type Result<T> = std::result::Result<T, CanonError>;

/// Errors raised while transforming a raw JSON value into CSNF, or while
/// serializing/hashing an already-canonical `Value`.
///
/// Every variant carries the JSON-pointer path at which the violation was
/// found so callers can surface a useful `VALIDATION/CSNF_VIOLATION`
/// cause chain entry (see `helm-errors`).
#[derive(Debug, Error)]
pub enum CanonError {
    #[error("CSNF_FLOAT_NOT_ALLOWED: non-integer number at {0}")]
    FloatNotAllowed(String),

    #[error("integer at {0} exceeds the safe range [-(2^53-1), 2^53-1]")]
    IntOutOfRange(String),

    #[error("string at {0} is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("decimal at {0} does not match the canonical decimal grammar")]
    InvalidDecimal(String),

    #[error("timestamp at {0} is not RFC-3339 with an explicit offset")]
    InvalidTimestamp(String),

    #[error("currency code at {0} is not three uppercase ASCII letters")]
    InvalidCurrency(String),

    #[error("schema mismatch at {0}: {1}")]
    SchemaMismatch(String, String),

    #[error("json-pointer {0} does not resolve")]
    PointerNotFound(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
