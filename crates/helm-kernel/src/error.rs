use thiserror::Error;

pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("HELM/CORE/AUTH/FAIL_CLOSED: {0}")]
    FailClosed(String),

    #[error("HELM/CORE/VALIDATION/UNKNOWN_TOOL: {0}")]
    UnknownTool(String),

    #[error("HELM/CORE/POLICY/REQUIRES_DECISION: {0}")]
    RequiresDecision(String),

    #[error("HELM/CORE/RESOURCE/CONFLICT: rate limit exceeded for principal {0}")]
    RateLimited(String),

    #[error("HELM/CORE/AUTH/INVALID_TOKEN_FORMAT: {0}")]
    InvalidTokenFormat(String),

    #[error("HELM/CORE/POLICY/DENIED:effect_digest_mismatch")]
    EffectDigestMismatch,

    #[error("HELM/CORE/EFFECT/CANCELED: {0}")]
    Canceled(String),

    #[error(transparent)]
    Canon(#[from] helm_canon::CanonError),

    #[error(transparent)]
    Crypto(#[from] helm_crypto::CryptoError),

    #[error(transparent)]
    Decision(#[from] helm_decision::DecisionError),

    #[error(transparent)]
    Boundary(#[from] helm_boundary::BoundaryError),
}

impl KernelError {
    pub fn to_error_ir(&self, instance: &str) -> helm_errors::ErrorIr {
        match self {
            KernelError::FailClosed(detail) => {
                helm_errors::ErrorIr::new("AUTH", "FAIL_CLOSED", "required capability unconfigured", detail, instance)
            }
            KernelError::UnknownTool(detail) => {
                helm_errors::ErrorIr::new("VALIDATION", "UNKNOWN_TOOL", "unknown tool", detail, instance)
            }
            KernelError::RequiresDecision(detail) => {
                helm_errors::ErrorIr::new("POLICY", "REQUIRES_DECISION", "missing decision token", detail, instance)
            }
            KernelError::RateLimited(detail) => {
                helm_errors::ErrorIr::new("RESOURCE", "CONFLICT", "rate limit exceeded", detail, instance)
            }
            KernelError::InvalidTokenFormat(detail) => {
                helm_errors::ErrorIr::new("AUTH", "INVALID_TOKEN_FORMAT", "malformed decision token", detail, instance)
            }
            KernelError::EffectDigestMismatch => helm_errors::ErrorIr::new(
                "POLICY",
                "DENIED",
                "effect digest mismatch",
                "args_hash did not match decision.effect_digest",
                instance,
            ),
            KernelError::Canceled(detail) => {
                helm_errors::ErrorIr::new("EFFECT", "CANCELED", "request context cancelled", detail, instance)
            }
            KernelError::Canon(err) => {
                helm_errors::ErrorIr::new("VALIDATION", "CSNF_VIOLATION", "canonicalization failed", &err.to_string(), instance)
            }
            KernelError::Crypto(err) => {
                helm_errors::ErrorIr::new("AUTH", "FAIL_CLOSED", "signing capability unavailable", &err.to_string(), instance)
            }
            KernelError::Decision(err) => err.to_error_ir(instance),
            KernelError::Boundary(err) => err.to_error_ir(instance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_boundary_not_found_keeps_its_own_classification() {
        let err = KernelError::Boundary(helm_boundary::BoundaryError::NotFound("effect-1".to_string()));
        let ir = err.to_error_ir("req-1");
        assert_eq!(ir.error_code, "HELM/CORE/RESOURCE/NOT_FOUND");
        assert_eq!(ir.status, 404);
    }

    #[test]
    fn wrapped_decision_bad_signature_keeps_its_own_classification() {
        let err = KernelError::Decision(helm_decision::DecisionError::BadSignature);
        let ir = err.to_error_ir("req-1");
        assert_eq!(ir.error_code, "HELM/CORE/AUTH/BAD_SIGNATURE");
        assert_eq!(ir.status, 400);
    }

    #[test]
    fn wrapped_decision_expired_keeps_its_own_classification() {
        let err = KernelError::Decision(helm_decision::DecisionError::DecisionExpired("2026-01-01T00:00:00Z".to_string()));
        let ir = err.to_error_ir("req-1");
        assert_eq!(ir.error_code, "HELM/CORE/AUTH/EXPIRED");
        assert_eq!(ir.status, 400);
    }
}
