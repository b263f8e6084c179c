//! Canonical Semantic Normal Form (CSNF): the kernel's data
//! canonicalization layer.
//!
//! `transform` turns arbitrary parsed JSON into the closed [`Value`] sum
//! type, rejecting anything that cannot be made canonical (non-integer
//! numbers, non-UTF-8 strings, malformed decimals/timestamps) instead of
//! silently coercing it. `hash` content-addresses a canonical value as
//! `H(JCS(CSNF(x)))`.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod hash;
mod jcs;
pub mod pointer;
mod schema;
mod transform;
mod value;

pub use error::CanonError;
pub use error::Result;
pub use hash::sha256_addr;
pub use hash::sha256_hex;
pub use jcs::to_jcs_bytes;
pub use schema::ArrayKind;
pub use schema::ArraySchema;
pub use schema::FieldSchema;
pub use schema::ObjectSchema;
pub use schema::Schema;
pub use transform::MAX_SAFE_INT;
pub use transform::transform;
pub use value::Value;

/// `hash(value) -> "sha256:…"`.
pub fn hash(value: &Value) -> String {
    hash::hash_value(value)
}

/// `normalize_json(bytes) -> bytes'`: parse raw JSON bytes, transform to
/// CSNF with no schema, and re-serialize as JCS bytes.
pub fn normalize_json(bytes: &[u8]) -> Result<Vec<u8>> {
    let parsed: serde_json::Value = serde_json::from_slice(bytes)?;
    let v = transform(&parsed, None)?;
    Ok(to_jcs_bytes(&v))
}
