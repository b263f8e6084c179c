use sha2::Digest;
use sha2::Sha256;

use crate::jcs::to_jcs_bytes;
use crate::value::Value;

/// `"sha256:" + hex(SHA256(bytes))`, the address format shared by blob
/// store addresses, evidence pack roots, and commit hashes.
pub fn sha256_addr(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// `H(JCS(CSNF(x)))`, content-addressing a canonical value.
pub fn hash_value(value: &Value) -> String {
    sha256_addr(&to_jcs_bytes(value))
}
