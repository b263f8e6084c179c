//! Content-addressed immutable blob store.
//!
//! Addresses are `"sha256:" + hex(SHA256(bytes))`. `store` is idempotent:
//! identical bytes always return the identical address. `store_redacted`
//! records only a commitment, the address a redacted blob *would* have
//! had, without ever holding the bytes, so a redaction can be proven
//! without the plaintext passing through the store.

#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CasError>;

#[derive(Debug, Error)]
pub enum CasError {
    #[error("blob {0} not found")]
    NotFound(String),

    #[error("address {0} is not a well-formed \"sha256:<hex>\" address")]
    MalformedAddress(String),
}

pub fn addr_of(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

fn validate_addr(addr: &str) -> Result<()> {
    let hex_part = addr
        .strip_prefix("sha256:")
        .ok_or_else(|| CasError::MalformedAddress(addr.to_string()))?;
    if hex_part.len() != 64 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CasError::MalformedAddress(addr.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub content: Arc<[u8]>,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct GetResult {
    pub content: Option<Arc<[u8]>>,
    pub mime: Option<String>,
    pub redacted: bool,
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, Blob>,
    redacted: HashMap<String, ()>,
}

/// In-memory content-addressed store. A single coarse-grained lock guards
/// the map, held only for the map operation itself.
pub struct BlobStore {
    inner: Mutex<Inner>,
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore {
    pub fn new() -> Self {
        BlobStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// `store(bytes, mime) -> addr`. Idempotent.
    pub fn store(&self, bytes: &[u8], mime: &str) -> String {
        let addr = addr_of(bytes);
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.blobs.entry(addr.clone()).or_insert_with(|| Blob {
            content: Arc::from(bytes),
            mime: mime.to_string(),
        });
        addr
    }

    /// `store_redacted(content_hash, mime) -> addr`. Writes only a
    /// commitment marker at the address the original bytes would have
    /// addressed to; `get` on that address reports `redacted: true` with
    /// no content.
    pub fn store_redacted(&self, content_hash: &str, _mime: &str) -> Result<String> {
        validate_addr(content_hash)?;
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.redacted.insert(content_hash.to_string(), ());
        Ok(content_hash.to_string())
    }

    pub fn get(&self, addr: &str) -> Result<GetResult> {
        validate_addr(addr)?;
        let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(blob) = inner.blobs.get(addr) {
            return Ok(GetResult {
                content: Some(blob.content.clone()),
                mime: Some(blob.mime.clone()),
                redacted: false,
            });
        }
        if inner.redacted.contains_key(addr) {
            return Ok(GetResult {
                content: None,
                mime: None,
                redacted: true,
            });
        }
        Err(CasError::NotFound(addr.to_string()))
    }

    pub fn has(&self, addr: &str) -> bool {
        let Ok(()) = validate_addr(addr) else {
            return false;
        };
        let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.blobs.contains_key(addr) || inner.redacted.contains_key(addr)
    }

    pub fn delete(&self, addr: &str) -> Result<()> {
        validate_addr(addr)?;
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if inner.blobs.remove(addr).is_none() && inner.redacted.remove(addr).is_none() {
            return Err(CasError::NotFound(addr.to_string()));
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut addrs: Vec<String> = inner
            .blobs
            .keys()
            .chain(inner.redacted.keys())
            .cloned()
            .collect();
        addrs.sort();
        addrs.dedup();
        addrs
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn store_is_idempotent() {
        let cas = BlobStore::new();
        let a = cas.store(b"hello", "text/plain");
        let b = cas.store(b"hello", "text/plain");
        assert_eq!(a, b);
        assert_eq!(cas.list().len(), 1);
    }

    #[test]
    fn redacted_blob_has_no_content() {
        let cas = BlobStore::new();
        let addr = addr_of(b"secret");
        cas.store_redacted(&addr, "text/plain").expect("store_redacted");
        let got = cas.get(&addr).expect("get");
        assert!(got.redacted);
        assert!(got.content.is_none());
        assert!(!cas.has(&format!("sha256:{}", "0".repeat(64))));
    }

    #[test]
    fn missing_blob_is_not_found() {
        let cas = BlobStore::new();
        let err = cas.get(&format!("sha256:{}", "0".repeat(64))).unwrap_err();
        assert!(matches!(err, CasError::NotFound(_)));
    }

    #[test]
    fn malformed_address_rejected() {
        let cas = BlobStore::new();
        let err = cas.get("not-an-address").unwrap_err();
        assert!(matches!(err, CasError::MalformedAddress(_)));
    }
}
