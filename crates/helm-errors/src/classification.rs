/// `classification ∈ {RETRYABLE, NON_RETRYABLE, IDEMPOTENT_SAFE,
/// COMPENSATION_REQUIRED}`, mapped to an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Classification {
    Retryable,
    NonRetryable,
    IdempotentSafe,
    CompensationRequired,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Retryable => "RETRYABLE",
            Classification::NonRetryable => "NON_RETRYABLE",
            Classification::IdempotentSafe => "IDEMPOTENT_SAFE",
            Classification::CompensationRequired => "COMPENSATION_REQUIRED",
        }
    }
}

/// One entry of the fixed namespace→classification table. `suffix` is
/// `None` when the whole namespace shares a classification, `Some(_)`
/// when the suffix overrides it (as with `EFFECT/*` and `CEL_DP/*`).
pub struct TableEntry {
    pub namespace: &'static str,
    pub suffix: Option<&'static str>,
    pub classification: Classification,
    pub status: u16,
}

/// The complete classification table: every namespace/suffix pair this
/// crate recognizes, total over the codes actually referenced elsewhere
/// in this document (decision-token rejection codes, the fail-closed
/// guard, illegal lifecycle transitions, unknown tools).
pub const CANONICAL_CLASSIFICATION_TABLE: &[TableEntry] = &[
    TableEntry {
        namespace: "VALIDATION",
        suffix: Some("SCHEMA_MISMATCH"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "VALIDATION",
        suffix: Some("CSNF_VIOLATION"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "VALIDATION",
        suffix: Some("UNKNOWN_TOOL"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("UNAUTHORIZED"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("FORBIDDEN"),
        classification: Classification::NonRetryable,
        status: 403,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("FAIL_CLOSED"),
        classification: Classification::NonRetryable,
        status: 403,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("INVALID_TOKEN_FORMAT"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("BAD_SIGNATURE"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "AUTH",
        suffix: Some("EXPIRED"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "POLICY",
        suffix: Some("DENIED"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "POLICY",
        suffix: Some("REQUIRES_DECISION"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "EFFECT",
        suffix: Some("TIMEOUT"),
        classification: Classification::Retryable,
        status: 503,
    },
    TableEntry {
        namespace: "EFFECT",
        suffix: Some("UPSTREAM_ERROR"),
        classification: Classification::Retryable,
        status: 503,
    },
    TableEntry {
        namespace: "EFFECT",
        suffix: Some("IDEMPOTENCY_CONFLICT"),
        classification: Classification::IdempotentSafe,
        status: 200,
    },
    TableEntry {
        namespace: "EFFECT",
        suffix: Some("CANCELED"),
        classification: Classification::NonRetryable,
        status: 499,
    },
    TableEntry {
        namespace: "RESOURCE",
        suffix: Some("CONFLICT"),
        classification: Classification::Retryable,
        status: 503,
    },
    TableEntry {
        namespace: "RESOURCE",
        suffix: Some("NOT_FOUND"),
        classification: Classification::NonRetryable,
        status: 404,
    },
    TableEntry {
        namespace: "CEL_DP",
        suffix: Some("VALIDATION_FAILED"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "CEL_DP",
        suffix: Some("COST_EXCEEDED"),
        classification: Classification::NonRetryable,
        status: 400,
    },
    TableEntry {
        namespace: "CEL_DP",
        suffix: Some("TIMEOUT"),
        classification: Classification::Retryable,
        status: 503,
    },
    TableEntry {
        namespace: "CORE",
        suffix: Some("INVALID_STATE"),
        classification: Classification::NonRetryable,
        status: 500,
    },
    TableEntry {
        namespace: "CORE",
        suffix: Some("COMPENSATION_REQUIRED"),
        classification: Classification::CompensationRequired,
        status: 500,
    },
];

/// Looks up `(namespace, suffix)` in the fixed table. Falls back to
/// `NON_RETRYABLE/500` for codes not present in the table — the taxonomy
/// is meant to be total over known codes, but an unrecognized code must
/// never be treated as safe to retry.
pub fn classify(namespace: &str, suffix: &str) -> (Classification, u16) {
    CANONICAL_CLASSIFICATION_TABLE
        .iter()
        .find(|e| e.namespace == namespace && e.suffix == Some(suffix))
        .map(|e| (e.classification, e.status))
        .unwrap_or((Classification::NonRetryable, 500))
}
