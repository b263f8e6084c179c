use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use helm_canon::Value;
use helm_crypto::Signer;
use helm_crypto::Verifier;

use crate::error::DecisionError;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
    Defer,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "ALLOW",
            Verdict::Deny => "DENY",
            Verdict::Defer => "DEFER",
        }
    }

    pub fn parse(s: &str) -> Option<Verdict> {
        match s {
            "ALLOW" => Some(Verdict::Allow),
            "DENY" => Some(Verdict::Deny),
            "DEFER" => Some(Verdict::Defer),
            _ => None,
        }
    }
}

/// A requery rule and timeout policy attached to a `DEFER` verdict.
/// `verdict=DEFER` requires a timeout policy, a requery rule, and at
/// least one required fact.
#[derive(Debug, Clone)]
pub struct Intervention {
    pub timeout_policy: String,
    pub requery_rule: String,
    pub required_facts: Vec<String>,
}

/// A signed PDP verdict binding a subject/action/resource triple to an
/// effect's canonical digest.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub id: String,
    pub proposal_id: String,
    pub subject: String,
    pub action: String,
    pub resource: String,
    pub effect_digest: String,
    pub verdict: Verdict,
    pub policy_backend_id: String,
    pub policy_content_hash: String,
    pub policy_decision_hash: String,
    pub timestamp: DateTime<Utc>,
    pub signature: Vec<u8>,
    pub signer_id: String,
    pub expiry: DateTime<Utc>,
    pub intervention: Option<Intervention>,
}

/// Unsigned inputs the PDP adapter produces before the kernel signer
/// takes over. Created by the PDP adapter on submit.
pub struct UnsignedDecision {
    pub id: String,
    pub proposal_id: String,
    pub subject: String,
    pub action: String,
    pub resource: String,
    pub effect_digest: String,
    pub verdict: Verdict,
    pub policy_backend_id: String,
    pub policy_content_hash: String,
    pub timestamp: DateTime<Utc>,
    pub expiry: DateTime<Utc>,
    pub intervention: Option<Intervention>,
}

/// `None` serializes to `Value::Null`; `Some` serializes to an object
/// with `timeout_policy`, `requery_rule`, and `required_facts` so the
/// intervention participates in both the self-hash and the signed bytes
/// rather than being dropped from the canonical encoding.
fn intervention_to_value(intervention: Option<&Intervention>) -> Value {
    match intervention {
        None => Value::Null,
        Some(i) => {
            let mut map = BTreeMap::new();
            map.insert("timeout_policy".to_string(), Value::String(i.timeout_policy.clone()));
            map.insert("requery_rule".to_string(), Value::String(i.requery_rule.clone()));
            map.insert(
                "required_facts".to_string(),
                Value::Array(i.required_facts.iter().cloned().map(Value::String).collect()),
            );
            Value::Object(map)
        }
    }
}

fn intervention_from_value(value: &Value) -> Result<Option<Intervention>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => {
            let field = |name: &str| -> Result<&Value> {
                map.get(name)
                    .ok_or_else(|| DecisionError::MalformedToken(format!("intervention missing field {name}")))
            };
            let timeout_policy = field("timeout_policy")?
                .as_str()
                .ok_or_else(|| DecisionError::MalformedToken("intervention.timeout_policy is not a string".into()))?
                .to_string();
            let requery_rule = field("requery_rule")?
                .as_str()
                .ok_or_else(|| DecisionError::MalformedToken("intervention.requery_rule is not a string".into()))?
                .to_string();
            let required_facts = field("required_facts")?
                .as_array()
                .ok_or_else(|| DecisionError::MalformedToken("intervention.required_facts is not an array".into()))?
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| DecisionError::MalformedToken("intervention.required_facts element is not a string".into()))
                })
                .collect::<Result<Vec<String>>>()?;
            Ok(Some(Intervention {
                timeout_policy,
                requery_rule,
                required_facts,
            }))
        }
        _ => Err(DecisionError::MalformedToken("intervention is not an object or null".into())),
    }
}

impl DecisionRecord {
    fn fields_to_value(
        unsigned: &UnsignedDecision,
        policy_decision_hash: &str,
        signer_id: &str,
    ) -> Value {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), Value::String(unsigned.id.clone()));
        map.insert(
            "proposal_id".to_string(),
            Value::String(unsigned.proposal_id.clone()),
        );
        map.insert("subject".to_string(), Value::String(unsigned.subject.clone()));
        map.insert("action".to_string(), Value::String(unsigned.action.clone()));
        map.insert("resource".to_string(), Value::String(unsigned.resource.clone()));
        map.insert(
            "effect_digest".to_string(),
            Value::String(unsigned.effect_digest.clone()),
        );
        map.insert(
            "verdict".to_string(),
            Value::String(unsigned.verdict.as_str().to_string()),
        );
        map.insert(
            "policy_backend_id".to_string(),
            Value::String(unsigned.policy_backend_id.clone()),
        );
        map.insert(
            "policy_content_hash".to_string(),
            Value::String(unsigned.policy_content_hash.clone()),
        );
        map.insert(
            "policy_decision_hash".to_string(),
            Value::String(policy_decision_hash.to_string()),
        );
        map.insert(
            "timestamp".to_string(),
            Value::String(unsigned.timestamp.to_rfc3339()),
        );
        map.insert("signer_id".to_string(), Value::String(signer_id.to_string()));
        map.insert(
            "expiry".to_string(),
            Value::String(unsigned.expiry.to_rfc3339()),
        );
        map.insert(
            "intervention".to_string(),
            intervention_to_value(unsigned.intervention.as_ref()),
        );
        Value::Object(map)
    }

    /// Signs an unsigned decision: computes `policy_decision_hash` as the
    /// self-hash over every field but `signature`/`policy_decision_hash`
    /// itself, then signs the canonical encoding that now includes that
    /// hash.
    pub fn issue(unsigned: UnsignedDecision, kernel_signer: &dyn Signer) -> Result<DecisionRecord> {
        if unsigned.verdict == Verdict::Defer {
            let valid = unsigned.intervention.as_ref().is_some_and(|i| {
                !i.timeout_policy.is_empty() && !i.requery_rule.is_empty() && !i.required_facts.is_empty()
            });
            if !valid {
                return Err(DecisionError::DeferRequiresIntervention);
            }
        }

        let pre_hash_value = Self::fields_to_value(&unsigned, "", kernel_signer.signer_id());
        let policy_decision_hash = helm_canon::hash(&pre_hash_value);

        let final_value =
            Self::fields_to_value(&unsigned, &policy_decision_hash, kernel_signer.signer_id());
        let bytes = helm_canon::to_jcs_bytes(&final_value);
        let signature = kernel_signer.sign(&bytes);

        Ok(DecisionRecord {
            id: unsigned.id,
            proposal_id: unsigned.proposal_id,
            subject: unsigned.subject,
            action: unsigned.action,
            resource: unsigned.resource,
            effect_digest: unsigned.effect_digest,
            verdict: unsigned.verdict,
            policy_backend_id: unsigned.policy_backend_id,
            policy_content_hash: unsigned.policy_content_hash,
            policy_decision_hash,
            timestamp: unsigned.timestamp,
            signature,
            signer_id: kernel_signer.signer_id().to_string(),
            expiry: unsigned.expiry,
            intervention: unsigned.intervention,
        })
    }

    /// A decision without `signature`/`signer_id` MUST NOT be accepted
    /// downstream.
    pub fn verify(&self, verifier: &dyn Verifier) -> Result<()> {
        if self.signature.is_empty() || self.signer_id.is_empty() {
            return Err(DecisionError::Unsigned);
        }
        let unsigned = UnsignedDecision {
            id: self.id.clone(),
            proposal_id: self.proposal_id.clone(),
            subject: self.subject.clone(),
            action: self.action.clone(),
            resource: self.resource.clone(),
            effect_digest: self.effect_digest.clone(),
            verdict: self.verdict,
            policy_backend_id: self.policy_backend_id.clone(),
            policy_content_hash: self.policy_content_hash.clone(),
            timestamp: self.timestamp,
            expiry: self.expiry,
            intervention: self.intervention.clone(),
        };
        let value = Self::fields_to_value(&unsigned, &self.policy_decision_hash, &self.signer_id);
        let bytes = helm_canon::to_jcs_bytes(&value);
        let ok = verifier.verify(&self.signer_id, &self.signature, &bytes)?;
        if !ok {
            return Err(DecisionError::BadSignature);
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Full wire encoding of the decision record as
    /// `base64url(JCS(CSNF(DecisionRecord)))`, including the signature.
    /// Unlike [`Self::fields_to_value`], which excludes it because it is
    /// what gets signed.
    pub fn to_wire_value(&self) -> Value {
        let unsigned = UnsignedDecision {
            id: self.id.clone(),
            proposal_id: self.proposal_id.clone(),
            subject: self.subject.clone(),
            action: self.action.clone(),
            resource: self.resource.clone(),
            effect_digest: self.effect_digest.clone(),
            verdict: self.verdict,
            policy_backend_id: self.policy_backend_id.clone(),
            policy_content_hash: self.policy_content_hash.clone(),
            timestamp: self.timestamp,
            expiry: self.expiry,
            intervention: self.intervention.clone(),
        };
        let mut value = Self::fields_to_value(&unsigned, &self.policy_decision_hash, &self.signer_id);
        if let Value::Object(map) = &mut value {
            map.insert("signature".to_string(), Value::Bytes(self.signature.clone()));
        }
        value
    }

    /// Reconstructs a `DecisionRecord` from its wire value. Does not
    /// verify the signature — callers must call [`Self::verify`]
    /// afterwards; this only checks the envelope is well-formed.
    pub fn from_wire_value(value: &Value) -> Result<DecisionRecord> {
        let map = value
            .as_object()
            .ok_or_else(|| DecisionError::MalformedToken("not an object".into()))?;
        let field = |name: &str| -> Result<&Value> {
            map.get(name)
                .ok_or_else(|| DecisionError::MalformedToken(format!("missing field {name}")))
        };
        let string_field = |name: &str| -> Result<String> {
            field(name)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| DecisionError::MalformedToken(format!("field {name} is not a string")))
        };
        let verdict = Verdict::parse(&string_field("verdict")?)
            .ok_or_else(|| DecisionError::MalformedToken("unknown verdict".into()))?;
        let timestamp = DateTime::parse_from_rfc3339(&string_field("timestamp")?)
            .map_err(|e| DecisionError::MalformedToken(e.to_string()))?
            .with_timezone(&Utc);
        let expiry = DateTime::parse_from_rfc3339(&string_field("expiry")?)
            .map_err(|e| DecisionError::MalformedToken(e.to_string()))?
            .with_timezone(&Utc);
        let signature = match field("signature")? {
            Value::Bytes(b) => b.clone(),
            _ => return Err(DecisionError::MalformedToken("signature is not bytes".into())),
        };
        let intervention = intervention_from_value(field("intervention")?)?;
        Ok(DecisionRecord {
            id: string_field("id")?,
            proposal_id: string_field("proposal_id")?,
            subject: string_field("subject")?,
            action: string_field("action")?,
            resource: string_field("resource")?,
            effect_digest: string_field("effect_digest")?,
            verdict,
            policy_backend_id: string_field("policy_backend_id")?,
            policy_content_hash: string_field("policy_content_hash")?,
            policy_decision_hash: string_field("policy_decision_hash")?,
            timestamp,
            signature,
            signer_id: string_field("signer_id")?,
            expiry,
            intervention,
        })
    }
}
