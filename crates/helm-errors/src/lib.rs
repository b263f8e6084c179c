//! Canonical error taxonomy and the deterministic retry machinery built on
//! top of it.
//!
//! Every error surfaced across a trust boundary is an [`ErrorIr`] whose
//! `classification` and `status` are derived from its namespace by
//! [`CANONICAL_CLASSIFICATION_TABLE`], never chosen ad hoc at the call
//! site. Retryable errors get a pre-committed [`RetryPlan`] whose
//! schedule is a pure function of its inputs.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod backoff;
mod classification;
mod error;
mod ir;

pub use backoff::RetryPlan;
pub use backoff::RetryPolicy;
pub use backoff::ScheduledAttempt;
pub use backoff::build_retry_plan;
pub use backoff::delay_ms;
pub use classification::CANONICAL_CLASSIFICATION_TABLE;
pub use classification::Classification;
pub use classification::TableEntry;
pub use classification::classify;
pub use error::ErrorsError;
pub use error::Result;
pub use ir::CauseEntry;
pub use ir::ErrorIr;
pub use ir::select_canonical;
pub use ir::split_code;
