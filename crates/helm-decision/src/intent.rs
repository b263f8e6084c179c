use std::collections::HashSet;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use sha2::Digest;
use sha2::Sha256;

use helm_crypto::Signer;
use helm_crypto::Verifier;

use crate::decision::DecisionRecord;
use crate::decision::Verdict;
use crate::error::DecisionError;
use crate::error::Result;

const INTENT_TTL_MINUTES: i64 = 5;

/// A short-lived, single-use authorization binding one decision to one
/// effect digest.
#[derive(Debug, Clone)]
pub struct ExecutionIntent {
    pub execution_id: String,
    pub decision_id: String,
    pub effect_digest: String,
    pub allowed_tool: String,
    pub idempotency_key: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub signer_id: String,
    pub signature: Vec<u8>,
}

fn execution_id(decision_id: &str, effect_digest: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(decision_id.as_bytes());
    hasher.update(effect_digest.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

fn signing_payload(execution_id: &str, decision_id: &str, effect_digest: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(execution_id.as_bytes());
    buf.extend_from_slice(decision_id.as_bytes());
    buf.extend_from_slice(effect_digest.as_bytes());
    buf
}

/// Mints an intent from an `ALLOW` decision. `expires_at = issued_at +
/// 5min` exactly, never caller supplied.
pub fn mint_intent(
    decision: &DecisionRecord,
    allowed_tool: &str,
    idempotency_key: &str,
    signer: &dyn Signer,
    now: DateTime<Utc>,
) -> Result<ExecutionIntent> {
    if decision.verdict != Verdict::Allow {
        return Err(DecisionError::NotAllowed);
    }
    if now >= decision.expiry {
        return Err(DecisionError::DecisionExpired(decision.expiry.to_rfc3339()));
    }
    let execution_id = execution_id(&decision.id, &decision.effect_digest);
    let payload = signing_payload(&execution_id, &decision.id, &decision.effect_digest);
    let signature = signer.sign(&payload);
    Ok(ExecutionIntent {
        execution_id,
        decision_id: decision.id.clone(),
        effect_digest: decision.effect_digest.clone(),
        allowed_tool: allowed_tool.to_string(),
        idempotency_key: idempotency_key.to_string(),
        issued_at: now,
        expires_at: now + Duration::minutes(INTENT_TTL_MINUTES),
        signer_id: signer.signer_id().to_string(),
        signature,
    })
}

/// Verifies an intent at the adapter edge: signature, expiry, and that
/// the actual effect's canonical digest matches the digest the intent
/// was bound to.
pub fn verify_intent(
    intent: &ExecutionIntent,
    verifier: &dyn Verifier,
    actual_effect_digest: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    if now >= intent.expires_at {
        return Err(DecisionError::IntentExpired(intent.expires_at.to_rfc3339()));
    }
    let payload = signing_payload(&intent.execution_id, &intent.decision_id, &intent.effect_digest);
    let ok = verifier.verify(&intent.signer_id, &intent.signature, &payload)?;
    if !ok {
        return Err(DecisionError::IntentBadSignature);
    }
    if intent.effect_digest != actual_effect_digest {
        return Err(DecisionError::EffectDigestMismatch);
    }
    Ok(())
}

/// Tracks which intents have been consumed so a duplicate consumption
/// returns `INTENT_ALREADY_CONSUMED` instead of executing twice.
/// Coarse-grained lock, held only for the membership check/insert.
#[derive(Default)]
pub struct IntentStore {
    consumed: Mutex<HashSet<String>>,
}

impl IntentStore {
    pub fn new() -> Self {
        IntentStore::default()
    }

    /// Marks `intent` consumed; the executor must call this before
    /// invoking the adapter, deleting or marking it consumed before the
    /// adapter call goes out.
    pub fn consume(&self, intent: &ExecutionIntent) -> Result<()> {
        let mut consumed = self.consumed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !consumed.insert(intent.execution_id.clone()) {
            return Err(DecisionError::AlreadyConsumed(intent.execution_id.clone()));
        }
        Ok(())
    }

    pub fn is_consumed(&self, execution_id: &str) -> bool {
        self.consumed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(execution_id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::decision::UnsignedDecision;
    use helm_crypto::Ed25519Signer;
    use helm_crypto::KeyRing;

    fn allowed_decision(now: DateTime<Utc>, signer: &Ed25519Signer) -> DecisionRecord {
        DecisionRecord::issue(
            UnsignedDecision {
                id: "dec-1".into(),
                proposal_id: "prop-1".into(),
                subject: "agent-1".into(),
                action: "call_mcp_tool".into(),
                resource: "tool:search".into(),
                effect_digest: "sha256:deadbeef".into(),
                verdict: Verdict::Allow,
                policy_backend_id: "pdp-1".into(),
                policy_content_hash: "sha256:cafef00d".into(),
                timestamp: now,
                expiry: now + Duration::minutes(10),
                intervention: None,
            },
            signer,
        )
        .expect("issue")
    }

    #[test]
    fn mint_requires_allow_verdict() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let now = Utc::now();
        let mut decision = allowed_decision(now, &signer);
        decision.verdict = Verdict::Deny;
        let err = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, now).unwrap_err();
        assert!(matches!(err, DecisionError::NotAllowed));
    }

    #[test]
    fn mint_rejects_expired_decision() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let now = Utc::now();
        let decision = allowed_decision(now, &signer);
        let later = decision.expiry + Duration::seconds(1);
        let err = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, later).unwrap_err();
        assert!(matches!(err, DecisionError::DecisionExpired(_)));
    }

    #[test]
    fn minted_intent_verifies_against_matching_digest() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let now = Utc::now();
        let decision = allowed_decision(now, &signer);
        let intent = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, now).expect("mint");
        verify_intent(&intent, &keyring, "sha256:deadbeef", now).expect("verify");
    }

    #[test]
    fn intent_rejects_mismatched_effect_digest() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let now = Utc::now();
        let decision = allowed_decision(now, &signer);
        let intent = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, now).expect("mint");
        let err = verify_intent(&intent, &keyring, "sha256:other", now).unwrap_err();
        assert!(matches!(err, DecisionError::EffectDigestMismatch));
    }

    #[test]
    fn intent_expiry_is_exactly_five_minutes() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let now = Utc::now();
        let decision = allowed_decision(now, &signer);
        let intent = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, now).expect("mint");
        assert_eq!(intent.expires_at - intent.issued_at, Duration::minutes(5));
    }

    #[test]
    fn duplicate_consumption_is_rejected() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let now = Utc::now();
        let decision = allowed_decision(now, &signer);
        let intent = mint_intent(&decision, "call_mcp_tool", "idem-1", &signer, now).expect("mint");
        let store = IntentStore::new();
        store.consume(&intent).expect("first consume");
        let err = store.consume(&intent).unwrap_err();
        assert!(matches!(err, DecisionError::AlreadyConsumed(_)));
    }
}
