use std::collections::BTreeMap;

use base64::Engine;
use helm_canon::FieldSchema;
use helm_canon::ObjectSchema;
use helm_canon::Schema;
use helm_decision::DecisionRecord;

use crate::error::KernelError;
use crate::error::Result;

/// `base64url(JCS(CSNF(DecisionRecord)))`.
pub fn encode_decision_token(decision: &DecisionRecord) -> String {
    let bytes = helm_canon::to_jcs_bytes(&decision.to_wire_value());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// `intervention` is `null` on an ALLOW/DENY decision token, so it must be
/// marked nullable — otherwise CSNF's schema-less null-stripping rule
/// (§4.1) would drop the key entirely before `from_wire_value` ever sees
/// it.
fn decision_token_schema() -> Schema {
    let mut fields = BTreeMap::new();
    fields.insert(
        "intervention".to_string(),
        FieldSchema {
            nullable: true,
            schema: Schema::Any,
        },
    );
    Schema::Object(ObjectSchema { fields })
}

/// Decodes a wire decision token. Does not verify the signature; callers
/// must call [`DecisionRecord::verify`] afterwards.
pub fn decode_decision_token(token: &str) -> Result<DecisionRecord> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| KernelError::InvalidTokenFormat(e.to_string()))?;
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| KernelError::InvalidTokenFormat(e.to_string()))?;
    let schema = decision_token_schema();
    let value = helm_canon::transform(&json, Some(&schema))?;
    DecisionRecord::from_wire_value(&value).map_err(KernelError::from)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::DateTime;
    use chrono::Utc;
    use helm_crypto::Ed25519Signer;
    use helm_crypto::KeyRing;
    use helm_decision::UnsignedDecision;
    use helm_decision::Verdict;

    #[test]
    fn encode_then_decode_round_trips() {
        let signer = Ed25519Signer::generate("kernel-signer-1");
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let decision = DecisionRecord::issue(
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
                expiry: now + chrono::Duration::minutes(5),
                intervention: None,
            },
            &signer,
        )
        .expect("issue");

        let token = encode_decision_token(&decision);
        let decoded = decode_decision_token(&token).expect("decode");
        decoded.verify(&keyring).expect("verifies");
        assert_eq!(decoded.effect_digest, "sha256:deadbeef");
    }

    #[test]
    fn garbage_token_is_invalid_format() {
        let err = decode_decision_token("not valid base64url!!").unwrap_err();
        assert!(matches!(err, KernelError::InvalidTokenFormat(_)));
    }
}
