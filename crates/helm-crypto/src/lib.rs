//! Signer/Verifier capability.
//!
//! There is no process-wide default signer: every caller that needs to
//! sign or verify is handed a concrete `&dyn Signer` / `&dyn Verifier` at
//! construction time. The one exception this crate makes on the caller's
//! behalf is [`require_signer`], which turns the *absence* of a signer
//! into a fail-closed error rather than letting callers forget the check.

#![deny(clippy::print_stdout, clippy::print_stderr)]

use std::collections::HashMap;

use ed25519_dalek::Signature;
use ed25519_dalek::Signer as _;
use ed25519_dalek::SigningKey;
use ed25519_dalek::VerifyingKey;
use ed25519_dalek::ed25519::signature::Verifier as _;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("HELM/CORE/AUTH/FAIL_CLOSED: no signer configured")]
    FailClosedNoSigner,

    #[error("signer {0} is not registered with this verifier")]
    UnknownSigner(String),

    #[error("signature is malformed")]
    MalformedSignature,

    #[error("key material is malformed")]
    InvalidKeyMaterial,
}

/// Capability to sign bytes on behalf of one named signer identity.
pub trait Signer: Send + Sync {
    fn signer_id(&self) -> &str;
    fn sign(&self, data: &[u8]) -> Vec<u8>;
    fn public_key_bytes(&self) -> Vec<u8>;
}

/// Capability to verify a signature against a named signer identity.
pub trait Verifier: Send + Sync {
    fn verify(&self, signer_id: &str, sig: &[u8], data: &[u8]) -> Result<bool>;
}

/// Absence of a signer on a signing path must be fatal, never an
/// "unsigned artifact". Callers compose this with `?` at the point they
/// would otherwise silently skip signing.
pub fn require_signer<'a>(signer: Option<&'a dyn Signer>) -> Result<&'a dyn Signer> {
    signer.ok_or(CryptoError::FailClosedNoSigner)
}

pub fn require_verifier<'a>(verifier: Option<&'a dyn Verifier>) -> Result<&'a dyn Verifier> {
    verifier.ok_or(CryptoError::FailClosedNoSigner)
}

/// Default algorithm: an in-memory Ed25519 keypair.
pub struct Ed25519Signer {
    signer_id: String,
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn generate(signer_id: impl Into<String>) -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Ed25519Signer {
            signer_id: signer_id.into(),
            signing_key,
        }
    }

    pub fn from_secret_bytes(signer_id: impl Into<String>, secret: &[u8; 32]) -> Self {
        Ed25519Signer {
            signer_id: signer_id.into(),
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn signer_id(&self) -> &str {
        &self.signer_id
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.signing_key.sign(data).to_bytes().to_vec()
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }
}

/// A verifier backed by a fixed map of `signer_id -> public key`,
/// populated once at construction (no runtime key discovery).
#[derive(Default)]
pub struct KeyRing {
    keys: HashMap<String, VerifyingKey>,
}

impl KeyRing {
    pub fn new() -> Self {
        KeyRing::default()
    }

    pub fn register(&mut self, signer_id: impl Into<String>, public_key: &[u8]) -> Result<()> {
        let bytes: [u8; 32] = public_key
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyMaterial)?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidKeyMaterial)?;
        self.keys.insert(signer_id.into(), key);
        Ok(())
    }

    pub fn register_signer(&mut self, signer: &Ed25519Signer) {
        self.keys
            .insert(signer.signer_id().to_string(), signer.verifying_key());
    }
}

impl Verifier for KeyRing {
    fn verify(&self, signer_id: &str, sig: &[u8], data: &[u8]) -> Result<bool> {
        let key = self
            .keys
            .get(signer_id)
            .ok_or_else(|| CryptoError::UnknownSigner(signer_id.to_string()))?;
        let sig_bytes: [u8; 64] = sig.try_into().map_err(|_| CryptoError::MalformedSignature)?;
        let signature = Signature::from_bytes(&sig_bytes);
        Ok(key.verify(data, &signature).is_ok())
    }
}

/// Usage flags an HSM/PKCS#11-backed key may be materialized with. The
/// concrete HSM driver lives outside this crate; this trait is the
/// interface the kernel requires of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Sign,
    Verify,
    Encrypt,
    Decrypt,
    Wrap,
    Unwrap,
}

/// An opaque key handle: the HSM never exposes raw key material, only a
/// handle plus the usages it was provisioned for.
#[derive(Debug, Clone)]
pub struct HsmKeyHandle {
    pub id: String,
    pub usage: Vec<KeyUsage>,
}

pub trait HsmBackend: Send + Sync {
    fn sign(&self, handle: &HsmKeyHandle, data: &[u8]) -> Result<Vec<u8>>;
    fn verify(&self, handle: &HsmKeyHandle, sig: &[u8], data: &[u8]) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);

        let sig = signer.sign(b"payload");
        assert!(keyring.verify("kernel-signer-1", &sig, b"payload").expect("verify"));
        assert!(!keyring.verify("kernel-signer-1", &sig, b"tampered").expect("verify"));
    }

    #[test]
    fn unknown_signer_is_an_error_not_false() {
        let keyring = KeyRing::new();
        let err = keyring.verify("ghost", &[0u8; 64], b"x").unwrap_err();
        assert!(matches!(err, CryptoError::UnknownSigner(_)));
    }

    #[test]
    fn missing_signer_fails_closed() {
        let err = require_signer(None).unwrap_err();
        assert!(matches!(err, CryptoError::FailClosedNoSigner));
    }
}
