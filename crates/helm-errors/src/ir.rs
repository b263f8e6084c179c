use crate::classification::Classification;
use crate::classification::classify;
use crate::error::ErrorsError;
use crate::error::Result;

/// One hop of error propagation: a lower-level error wrapped into a
/// higher-level cause chain entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CauseEntry {
    pub error_code: String,
    pub at: String,
}

/// `ErrorIR`: an RFC-9457 problem+json body plus the `helm.*` extension
/// members. `detail`/`title` never carry raw adapter-internal strings
/// that crossed a trust boundary; callers are expected to have already
/// hashed those into a commitment and passed only the opaque reference
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorIr {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub error_code: String,
    pub namespace: String,
    pub classification: Classification,
    pub cause_chain: Vec<CauseEntry>,
}

/// Splits a full error code (`"HELM/CORE/AUTH/FAIL_CLOSED"`) into the
/// namespace (`"AUTH"`) and suffix (`"FAIL_CLOSED"`) used to look up the
/// classification table.
pub fn split_code(error_code: &str) -> Result<(String, String)> {
    let segments: Vec<&str> = error_code.split('/').collect();
    if segments.len() < 2 {
        return Err(ErrorsError::InvalidCode(error_code.to_string()));
    }
    let suffix = segments[segments.len() - 1].to_string();
    let namespace = segments[segments.len() - 2].to_string();
    Ok((namespace, suffix))
}

impl ErrorIr {
    /// Builds a canonical `HELM/CORE/<namespace>/<suffix>` error,
    /// deriving `status` and `classification` from the fixed table.
    pub fn new(namespace: &str, suffix: &str, title: &str, detail: &str, instance: &str) -> Self {
        let (classification, status) = classify(namespace, suffix);
        let error_code = format!("HELM/CORE/{namespace}/{suffix}");
        ErrorIr {
            r#type: format!("https://helm.dev/errors/{namespace}/{suffix}"),
            title: title.to_string(),
            status,
            detail: detail.to_string(),
            instance: instance.to_string(),
            error_code,
            namespace: namespace.to_string(),
            classification,
            cause_chain: Vec::new(),
        }
    }

    /// Wraps this error as a cause of a higher-level error.
    pub fn wrap(mut self, at: &str, outer: ErrorIr) -> ErrorIr {
        let mut outer = outer;
        outer.cause_chain.push(CauseEntry {
            error_code: self.error_code.clone(),
            at: at.to_string(),
        });
        outer.cause_chain.append(&mut self.cause_chain);
        outer
    }

    /// First `at` pointer in the cause chain, used by canonical
    /// selection.
    pub fn first_cause_path(&self) -> &str {
        self.cause_chain.first().map(|c| c.at.as_str()).unwrap_or("")
    }
}

/// `select(E)`: returns the element with minimum
/// `(error_code, first_cause_path)` lexicographically.
pub fn select_canonical(candidates: &[ErrorIr]) -> Option<&ErrorIr> {
    candidates.iter().min_by(|a, b| {
        (a.error_code.as_str(), a.first_cause_path())
            .cmp(&(b.error_code.as_str(), b.first_cause_path()))
    })
}
