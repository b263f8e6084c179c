use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecisionError>;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("HELM/CORE/AUTH/UNAUTHORIZED: decision record missing signature or signer_id")]
    Unsigned,

    #[error("HELM/CORE/AUTH/BAD_SIGNATURE: decision signature does not verify")]
    BadSignature,

    #[error("HELM/CORE/AUTH/EXPIRED: decision expired at {0}")]
    DecisionExpired(String),

    #[error("decision verdict is not ALLOW, cannot mint intent")]
    NotAllowed,

    #[error("HELM/CORE/AUTH/EXPIRED: intent expired at {0}")]
    IntentExpired(String),

    #[error("HELM/CORE/AUTH/BAD_SIGNATURE: intent signature does not verify")]
    IntentBadSignature,

    #[error("HELM/POLICY/DENIED:effect_digest_mismatch: intent bound to a different effect")]
    EffectDigestMismatch,

    #[error("INTENT_ALREADY_CONSUMED: execution_id {0}")]
    AlreadyConsumed(String),

    #[error("HELM/CORE/AUTH/INVALID_TOKEN_FORMAT: {0}")]
    MalformedToken(String),

    #[error(
        "HELM/VALIDATION/SCHEMA_MISMATCH: DEFER verdict requires an intervention with a \
         timeout_policy, a requery_rule, and at least one required fact"
    )]
    DeferRequiresIntervention,

    #[error(transparent)]
    Crypto(#[from] helm_crypto::CryptoError),

    #[error(transparent)]
    Canon(#[from] helm_canon::CanonError),
}

impl DecisionError {
    /// Wraps this error into a canonical [`helm_errors::ErrorIr`], the
    /// way [`helm_boundary::BoundaryError::to_error_ir`] does for the
    /// boundary's own errors — so a kernel caller sees the real
    /// classification instead of a generic internal-error fallback.
    pub fn to_error_ir(&self, instance: &str) -> helm_errors::ErrorIr {
        match self {
            DecisionError::Unsigned => helm_errors::ErrorIr::new(
                "AUTH",
                "UNAUTHORIZED",
                "decision is unsigned",
                "decision record is missing signature or signer_id",
                instance,
            ),
            DecisionError::BadSignature | DecisionError::IntentBadSignature => {
                helm_errors::ErrorIr::new("AUTH", "BAD_SIGNATURE", "signature does not verify", &self.to_string(), instance)
            }
            DecisionError::DecisionExpired(detail) | DecisionError::IntentExpired(detail) => {
                helm_errors::ErrorIr::new("AUTH", "EXPIRED", "decision or intent has expired", detail, instance)
            }
            DecisionError::NotAllowed => helm_errors::ErrorIr::new(
                "POLICY",
                "DENIED",
                "decision verdict is not ALLOW",
                "cannot mint an execution intent from a non-ALLOW decision",
                instance,
            ),
            DecisionError::EffectDigestMismatch => helm_errors::ErrorIr::new(
                "POLICY",
                "DENIED",
                "effect digest mismatch",
                "intent is bound to a different effect digest",
                instance,
            ),
            DecisionError::AlreadyConsumed(detail) => {
                helm_errors::ErrorIr::new("RESOURCE", "CONFLICT", "intent already consumed", detail, instance)
            }
            DecisionError::MalformedToken(detail) => {
                helm_errors::ErrorIr::new("AUTH", "INVALID_TOKEN_FORMAT", "malformed decision token", detail, instance)
            }
            DecisionError::DeferRequiresIntervention => helm_errors::ErrorIr::new(
                "VALIDATION",
                "SCHEMA_MISMATCH",
                "DEFER verdict missing intervention",
                &self.to_string(),
                instance,
            ),
            DecisionError::Crypto(err) => {
                helm_errors::ErrorIr::new("AUTH", "FAIL_CLOSED", "signing capability unavailable", &err.to_string(), instance)
            }
            DecisionError::Canon(err) => {
                helm_errors::ErrorIr::new("VALIDATION", "CSNF_VIOLATION", "canonicalization failed", &err.to_string(), instance)
            }
        }
    }
}
