use chrono::DateTime;
use chrono::Utc;
use helm_canon::Value;

use crate::error::BoundaryError;
use crate::error::Result;

/// Closed set of effect types the boundary will intake, mirrored from
/// the kernel's effectful tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectType {
    CreateObligation,
    CallMcpTool,
    SubmitModuleBundle,
    RequestModuleActivation,
}

impl EffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectType::CreateObligation => "create_obligation",
            EffectType::CallMcpTool => "call_mcp_tool",
            EffectType::SubmitModuleBundle => "submit_module_bundle",
            EffectType::RequestModuleActivation => "request_module_activation",
        }
    }

    pub fn parse(s: &str) -> Option<EffectType> {
        match s {
            "create_obligation" => Some(EffectType::CreateObligation),
            "call_mcp_tool" => Some(EffectType::CallMcpTool),
            "submit_module_bundle" => Some(EffectType::SubmitModuleBundle),
            "request_module_activation" => Some(EffectType::RequestModuleActivation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subject {
    pub subject_id: String,
    pub subject_type: String,
    pub session: String,
}

#[derive(Debug, Clone)]
pub struct Payload {
    pub hash: Option<String>,
    pub data: Option<Value>,
}

/// `key_derivation`: one of `client_provided | content_hash | effect_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDerivation {
    ClientProvided,
    ContentHash,
    EffectId,
}

#[derive(Debug, Clone)]
pub struct Idempotency {
    pub key: String,
    pub derivation: KeyDerivation,
    pub window_seconds: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct EffectContext {
    pub mode: String,
    pub loop_id: String,
    pub env_snapshot: String,
}

/// `EffectRequest`: constructed by the caller and frozen once submitted.
#[derive(Debug, Clone)]
pub struct EffectRequest {
    pub effect_id: String,
    pub effect_type: EffectType,
    pub subject: Subject,
    pub payload: Payload,
    pub idempotency: Idempotency,
    pub context: EffectContext,
    pub submitted_at: DateTime<Utc>,
}

/// A fresh opaque `effect_id` for callers that don't derive one from
/// their own domain.
pub fn generate_effect_id() -> String {
    format!("eff_{}", uuid::Uuid::new_v4())
}

impl EffectRequest {
    /// Validates the request and fills in `payload.hash` when absent but
    /// `payload.data` is present.
    pub fn validated(mut self) -> Result<Self> {
        if self.subject.subject_id.trim().is_empty() {
            return Err(BoundaryError::Validation("subject.subject_id is empty".into()));
        }
        if self.effect_id.trim().is_empty() {
            return Err(BoundaryError::Validation("effect_id is empty".into()));
        }
        if self.payload.hash.is_none() {
            if let Some(data) = &self.payload.data {
                self.payload.hash = Some(helm_canon::hash(data));
            }
        }
        Ok(self)
    }
}
