use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use chrono::Utc;
use helm_boundary::EffectBoundary;
use helm_boundary::EffectContext;
use helm_boundary::EffectRequest;
use helm_boundary::EffectType;
use helm_boundary::Idempotency;
use helm_boundary::KeyDerivation;
use helm_boundary::LifecycleState;
use helm_boundary::Payload;
use helm_boundary::PdpAdapter;
use helm_boundary::PdpVerdict;
use helm_boundary::Subject;
use helm_canon::Value;
use helm_cas::BlobStore;
use helm_crypto::Signer;
use helm_crypto::Verifier;
use helm_decision::DecisionRecord;
use helm_decision::IntentStore;
use helm_decision::Verdict;
use helm_log::TotalOrderLog;
use helm_merkle::MerkleTree;
use helm_ratelimit::RateLimitPolicy;
use helm_ratelimit::RateLimiter;
use tracing::instrument;
use tracing::warn;

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::error::Result;
use crate::token::decode_decision_token;
use crate::tool::ToolName;

/// A cooperative cancellation flag shared between a caller and whatever
/// dispatch the caller's [`DispatchContext`] is attached to. Checked at
/// every suspension point named in spec §5: rate-limiter acquisition,
/// PDP/decision check, executor call, log append, blob store I/O.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ambient request context carrying the caller id, session, loop id, and
/// an optional cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    pub caller_id: Option<String>,
    pub session: String,
    pub loop_id: String,
    /// Hash of the environment snapshot the caller observed; recorded on
    /// the effect request's context, not otherwise interpreted here.
    pub env_snapshot: String,
    pub cancel: Option<CancelToken>,
}

impl DispatchContext {
    /// Resolve principal from `ctx` (`"anonymous"` if absent).
    fn principal(&self) -> &str {
        self.caller_id.as_deref().unwrap_or("anonymous")
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

/// `None` for tools `ToolName::effectful()` reports `false` for; the
/// caller only invokes this once that predicate has already gated entry
/// into the effectful dispatch path.
fn tool_to_effect_type(tool: ToolName) -> Option<EffectType> {
    match tool {
        ToolName::CreateObligation => Some(EffectType::CreateObligation),
        ToolName::CallMcpTool => Some(EffectType::CallMcpTool),
        ToolName::SubmitModuleBundle => Some(EffectType::SubmitModuleBundle),
        ToolName::RequestModuleActivation => Some(EffectType::RequestModuleActivation),
        ToolName::McpToolSearch | ToolName::SearchObligations | ToolName::RequestDecision => None,
    }
}

/// Treats a decision token that has already been decoded and verified as
/// the PDP's answer: the actual policy evaluation happened out-of-band
/// (at `request_decision` time), so this adapter only replays that
/// verdict into the boundary's submit step.
struct AlreadyAdjudicated<'a> {
    decision: &'a DecisionRecord,
}

impl PdpAdapter for AlreadyAdjudicated<'_> {
    fn decide(&self, _req: &EffectRequest) -> PdpVerdict {
        match self.decision.verdict {
            Verdict::Allow => PdpVerdict::Allow {
                decision_id: self.decision.id.clone(),
            },
            Verdict::Deny => PdpVerdict::Deny {
                decision_id: Some(self.decision.id.clone()),
                reason: "decision verdict is DENY".to_string(),
            },
            Verdict::Defer => PdpVerdict::Error {
                detail: "decision verdict is DEFER, cannot execute".to_string(),
            },
        }
    }
}

/// Capability that performs the actual side effect for an effectful tool
/// call, consumed by the boundary as an opaque adapter rather than a
/// plugin loaded by name.
pub trait Executor: Send + Sync {
    fn execute(&self, tool: ToolName, params: &Value) -> std::result::Result<(Value, Value), String>;
}

/// `KernelBridge`: the single dispatch entry point wiring admission,
/// decision binding, intent mint, execution, and evidence commitment
/// together.
pub struct KernelBridge {
    config: KernelConfig,
    rate_limiter: RateLimiter,
    signer: Option<Arc<dyn Signer>>,
    verifier: Option<Arc<dyn Verifier>>,
    executor: Option<Arc<dyn Executor>>,
    log: Option<Arc<TotalOrderLog>>,
    evidence: Option<Arc<BlobStore>>,
    intents: IntentStore,
    boundary: EffectBoundary,
}

impl KernelBridge {
    pub fn new(config: KernelConfig) -> Self {
        KernelBridge {
            config,
            rate_limiter: RateLimiter::new(),
            signer: None,
            verifier: None,
            executor: None,
            log: None,
            evidence: None,
            intents: IntentStore::new(),
            boundary: EffectBoundary::new(),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_log(mut self, log: Arc<TotalOrderLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_evidence_store(mut self, evidence: Arc<BlobStore>) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// `Dispatch(ctx, tool_name, params) -> (result, error)`.
    /// `decision_token` is the base64url-encoded `DecisionRecord`
    /// the caller obtained from a prior `request_decision` call;
    /// required for effectful tools, ignored otherwise.
    #[instrument(skip(self, params, decision_token), fields(tool = %tool_name))]
    pub fn dispatch(
        &self,
        ctx: &DispatchContext,
        tool_name: &str,
        params: Value,
        decision_token: Option<&str>,
    ) -> Result<Value> {
        if ctx.is_cancelled() {
            return Err(KernelError::Canceled("cancelled before admission check".to_string()));
        }

        let principal = ctx.principal();
        let policy = RateLimitPolicy {
            rpm: self.config.default_rpm,
            burst: self.config.default_burst,
        };
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        if !self.rate_limiter.allow(principal, policy, 1.0, now_ms) {
            warn!(principal, "rate limit exceeded, denying admission");
            return Err(KernelError::RateLimited(principal.to_string()));
        }

        let Some(tool) = ToolName::parse(tool_name) else {
            warn!(tool_name, "dispatch requested for unknown tool");
            return Err(KernelError::UnknownTool(tool_name.to_string()));
        };

        if !tool.effectful() {
            return self.dispatch_non_effectful(ctx, tool, &params);
        }

        self.dispatch_effectful(ctx, tool, params, decision_token)
    }

    fn dispatch_non_effectful(&self, ctx: &DispatchContext, tool: ToolName, params: &Value) -> Result<Value> {
        let executor = self.require_executor()?;
        if ctx.is_cancelled() {
            return Err(KernelError::Canceled("cancelled before executor call".to_string()));
        }
        executor
            .execute(tool, params)
            .map(|(_, result)| result)
            .map_err(KernelError::FailClosed)
    }

    /// Drives an effectful tool call through the effect boundary's
    /// `Submit`/`Execute`/`Complete` lifecycle state machine (C11),
    /// binding it to the decision already adjudicated out-of-band by a
    /// prior `request_decision` round-trip.
    fn dispatch_effectful(
        &self,
        ctx: &DispatchContext,
        tool: ToolName,
        params: Value,
        decision_token: Option<&str>,
    ) -> Result<Value> {
        let signer = self.require_signer()?;
        let verifier = self.require_verifier()?;
        let executor = self.require_executor()?;
        let log = self.require_log()?;
        let evidence_store = self.require_evidence_store()?;

        // Direct-MCP path is frozen closed: no prior `request_decision`
        // round-trip means no token, which always rejects (DESIGN.md).
        let Some(token) = decision_token else {
            warn!(tool = tool.as_str(), "effectful tool invoked without a decision token");
            return Err(KernelError::RequiresDecision(tool.as_str().to_string()));
        };

        if ctx.is_cancelled() {
            return Err(KernelError::Canceled("cancelled before decision check".to_string()));
        }

        let args_hash = helm_canon::hash(&params);
        let decision = decode_decision_token(token)?;
        decision.verify(verifier)?;
        if args_hash != decision.effect_digest {
            warn!(tool = tool.as_str(), "args_hash does not match decision effect_digest");
            return Err(KernelError::EffectDigestMismatch);
        }

        let effect_type = tool_to_effect_type(tool)
            .ok_or_else(|| KernelError::FailClosed(format!("{} is not an effectful tool", tool.as_str())))?;
        let now = Utc::now();
        let effect_request = EffectRequest {
            effect_id: helm_boundary::generate_effect_id(),
            effect_type,
            subject: Subject {
                subject_id: ctx.principal().to_string(),
                subject_type: "agent".to_string(),
                session: ctx.session.clone(),
            },
            payload: Payload {
                hash: Some(args_hash),
                data: Some(params.clone()),
            },
            idempotency: Idempotency {
                key: decision.id.clone(),
                derivation: KeyDerivation::ClientProvided,
                window_seconds: None,
            },
            context: EffectContext {
                mode: "live".to_string(),
                loop_id: ctx.loop_id.clone(),
                env_snapshot: ctx.env_snapshot.clone(),
            },
            submitted_at: now,
        };
        let lifecycle = self.boundary.submit(effect_request, &AlreadyAdjudicated { decision: &decision })?;
        if lifecycle.state != LifecycleState::Approved {
            return Err(KernelError::RequiresDecision(
                "effect boundary did not approve the effect".to_string(),
            ));
        }

        if ctx.is_cancelled() {
            return Err(KernelError::Canceled("cancelled before intent mint".to_string()));
        }

        let intent = helm_decision::mint_intent(
            &decision,
            tool.as_str(),
            &decision.id,
            signer.as_ref(),
            now,
        )?;
        self.intents.consume(&intent)?;
        self.boundary.execute(&lifecycle.effect_id, now)?;

        if ctx.is_cancelled() {
            self.boundary.fail_with_cause(&lifecycle.effect_id, "CANCELED")?;
            return Err(KernelError::Canceled("cancelled after execution began".to_string()));
        }

        let (receipt, result) = match executor.execute(tool, &params) {
            Ok(pair) => pair,
            Err(detail) => {
                self.boundary.fail(&lifecycle.effect_id)?;
                return Err(KernelError::FailClosed(detail));
            }
        };

        if ctx.is_cancelled() {
            self.boundary.fail_with_cause(&lifecycle.effect_id, "CANCELED")?;
            return Err(KernelError::Canceled("cancelled before evidence commit".to_string()));
        }

        // Canonicalize the receipt, Merkleize it, and commit the evidence
        // pack to the blob store under its own root address before the log
        // records that the effect completed.
        let mut evidence_doc = BTreeMap::new();
        evidence_doc.insert("decision_id".to_string(), Value::String(decision.id.clone()));
        evidence_doc.insert("effect_digest".to_string(), Value::String(decision.effect_digest.clone()));
        evidence_doc.insert("receipt".to_string(), receipt);
        let evidence_doc = Value::Object(evidence_doc);
        let evidence_tree = MerkleTree::build(&evidence_doc);
        let evidence_root = evidence_tree.root_addr();
        evidence_store.store(&helm_canon::to_jcs_bytes(&evidence_doc), "application/json");

        if ctx.is_cancelled() {
            self.boundary.fail_with_cause(&lifecycle.effect_id, "CANCELED")?;
            return Err(KernelError::Canceled("cancelled before log append".to_string()));
        }

        log.commit(
            format!("decision.signed:{}", decision.id).into_bytes(),
            now.timestamp_nanos_opt().unwrap_or_default(),
            None,
        );
        log.commit(
            format!("effect.completed:{evidence_root}").into_bytes(),
            now.timestamp_nanos_opt().unwrap_or_default(),
            None,
        );

        self.boundary.complete(&lifecycle.effect_id, &evidence_root, now)?;

        Ok(result)
    }

    fn require_signer(&self) -> Result<&Arc<dyn Signer>> {
        self.signer
            .as_ref()
            .ok_or_else(|| KernelError::FailClosed("signer not configured".to_string()))
    }

    fn require_verifier(&self) -> Result<&Arc<dyn Verifier>> {
        self.verifier
            .as_ref()
            .ok_or_else(|| KernelError::FailClosed("verifier not configured".to_string()))
    }

    fn require_executor(&self) -> Result<&Arc<dyn Executor>> {
        self.executor
            .as_ref()
            .ok_or_else(|| KernelError::FailClosed("executor not configured".to_string()))
    }

    fn require_log(&self) -> Result<&Arc<TotalOrderLog>> {
        self.log
            .as_ref()
            .ok_or_else(|| KernelError::FailClosed("log not configured".to_string()))
    }

    fn require_evidence_store(&self) -> Result<&Arc<BlobStore>> {
        self.evidence
            .as_ref()
            .ok_or_else(|| KernelError::FailClosed("evidence store not configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use helm_crypto::Ed25519Signer;
    use helm_crypto::KeyRing;
    use helm_decision::UnsignedDecision;
    use std::collections::BTreeMap;

    struct EchoExecutor;
    impl Executor for EchoExecutor {
        fn execute(&self, _tool: ToolName, params: &Value) -> std::result::Result<(Value, Value), String> {
            Ok((params.clone(), params.clone()))
        }
    }

    fn bridge_without_capabilities() -> KernelBridge {
        KernelBridge::new(KernelConfig::default())
    }

    fn params_obj() -> Value {
        Value::Object(BTreeMap::new())
    }

    #[test]
    fn fail_closed_without_signer_or_executor() {
        let bridge = bridge_without_capabilities();
        let ctx = DispatchContext::default();
        let err = bridge
            .dispatch(&ctx, "call_mcp_tool", params_obj(), Some("whatever"))
            .unwrap_err();
        assert!(matches!(err, KernelError::FailClosed(_)));
    }

    #[test]
    fn unknown_tool_name_is_rejected() {
        let bridge = bridge_without_capabilities().with_executor(Arc::new(EchoExecutor));
        let ctx = DispatchContext::default();
        let err = bridge.dispatch(&ctx, "delete_everything", params_obj(), None).unwrap_err();
        assert!(matches!(err, KernelError::UnknownTool(_)));
    }

    #[test]
    fn effectful_tool_without_token_requires_decision() {
        let signer = Arc::new(Ed25519Signer::generate("kernel-signer-1"));
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let bridge = bridge_without_capabilities()
            .with_signer(signer)
            .with_verifier(Arc::new(keyring))
            .with_executor(Arc::new(EchoExecutor))
            .with_log(Arc::new(TotalOrderLog::new()))
            .with_evidence_store(Arc::new(BlobStore::new()));
        let ctx = DispatchContext::default();
        let err = bridge.dispatch(&ctx, "call_mcp_tool", params_obj(), None).unwrap_err();
        assert!(matches!(err, KernelError::RequiresDecision(_)));
    }

    #[test]
    fn non_effectful_tool_bypasses_decision_requirement() {
        let bridge = bridge_without_capabilities().with_executor(Arc::new(EchoExecutor));
        let ctx = DispatchContext::default();
        let result = bridge
            .dispatch(&ctx, "mcp_tool_search", params_obj(), None)
            .expect("non-effectful dispatch succeeds without a token");
        assert_eq!(result, params_obj());
    }

    #[test]
    fn effectful_tool_with_valid_token_and_matching_digest_succeeds() {
        let signer = Arc::new(Ed25519Signer::generate("kernel-signer-1"));
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let bridge = bridge_without_capabilities()
            .with_signer(signer.clone())
            .with_verifier(Arc::new(keyring))
            .with_executor(Arc::new(EchoExecutor))
            .with_log(Arc::new(TotalOrderLog::new()))
            .with_evidence_store(Arc::new(BlobStore::new()));

        let params = params_obj();
        let args_hash = helm_canon::hash(&params);
        let now = Utc::now();
        let decision = DecisionRecord::issue(
            UnsignedDecision {
                id: "dec-1".into(),
                proposal_id: "prop-1".into(),
                subject: "agent-1".into(),
                action: "call_mcp_tool".into(),
                resource: "tool:call_mcp_tool".into(),
                effect_digest: args_hash,
                verdict: Verdict::Allow,
                policy_backend_id: "pdp-1".into(),
                policy_content_hash: "sha256:cafef00d".into(),
                timestamp: now,
                expiry: now + chrono::Duration::minutes(5),
                intervention: None,
            },
            signer.as_ref(),
        )
        .expect("issue");
        let token = crate::token::encode_decision_token(&decision);

        let ctx = DispatchContext::default();
        let result = bridge
            .dispatch(&ctx, "call_mcp_tool", params.clone(), Some(&token))
            .expect("dispatch succeeds");
        assert_eq!(result, params);
    }

    #[test]
    fn effectful_tool_with_mismatched_digest_is_rejected() {
        let signer = Arc::new(Ed25519Signer::generate("kernel-signer-1"));
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let bridge = bridge_without_capabilities()
            .with_signer(signer.clone())
            .with_verifier(Arc::new(keyring))
            .with_executor(Arc::new(EchoExecutor))
            .with_log(Arc::new(TotalOrderLog::new()))
            .with_evidence_store(Arc::new(BlobStore::new()));

        let now = Utc::now();
        let decision = DecisionRecord::issue(
            UnsignedDecision {
                id: "dec-1".into(),
                proposal_id: "prop-1".into(),
                subject: "agent-1".into(),
                action: "call_mcp_tool".into(),
                resource: "tool:call_mcp_tool".into(),
                effect_digest: "sha256:doesnotmatch".into(),
                verdict: Verdict::Allow,
                policy_backend_id: "pdp-1".into(),
                policy_content_hash: "sha256:cafef00d".into(),
                timestamp: now,
                expiry: now + chrono::Duration::minutes(5),
                intervention: None,
            },
            signer.as_ref(),
        )
        .expect("issue");
        let token = crate::token::encode_decision_token(&decision);

        let ctx = DispatchContext::default();
        let err = bridge
            .dispatch(&ctx, "call_mcp_tool", params_obj(), Some(&token))
            .unwrap_err();
        assert!(matches!(err, KernelError::EffectDigestMismatch));
    }

    #[test]
    fn cancelled_context_aborts_before_admission() {
        let bridge = bridge_without_capabilities().with_executor(Arc::new(EchoExecutor));
        let cancel = CancelToken::new();
        cancel.cancel();
        let ctx = DispatchContext {
            cancel: Some(cancel),
            ..DispatchContext::default()
        };
        let err = bridge.dispatch(&ctx, "mcp_tool_search", params_obj(), None).unwrap_err();
        assert!(matches!(err, KernelError::Canceled(_)));
    }

    #[test]
    fn cancelled_context_after_execution_begins_fails_the_lifecycle_not_leaves_it_executing() {
        struct HangingExecutor;
        impl Executor for HangingExecutor {
            fn execute(&self, _tool: ToolName, params: &Value) -> std::result::Result<(Value, Value), String> {
                Ok((params.clone(), params.clone()))
            }
        }

        let signer = Arc::new(Ed25519Signer::generate("kernel-signer-1"));
        let mut keyring = KeyRing::new();
        keyring.register_signer(&signer);
        let bridge = bridge_without_capabilities()
            .with_signer(signer.clone())
            .with_verifier(Arc::new(keyring))
            .with_executor(Arc::new(HangingExecutor))
            .with_log(Arc::new(TotalOrderLog::new()))
            .with_evidence_store(Arc::new(BlobStore::new()));

        let params = params_obj();
        let args_hash = helm_canon::hash(&params);
        let now = Utc::now();
        let decision = DecisionRecord::issue(
            UnsignedDecision {
                id: "dec-cancel".into(),
                proposal_id: "prop-1".into(),
                subject: "agent-1".into(),
                action: "call_mcp_tool".into(),
                resource: "tool:call_mcp_tool".into(),
                effect_digest: args_hash,
                verdict: Verdict::Allow,
                policy_backend_id: "pdp-1".into(),
                policy_content_hash: "sha256:cafef00d".into(),
                timestamp: now,
                expiry: now + chrono::Duration::minutes(5),
                intervention: None,
            },
            signer.as_ref(),
        )
        .expect("issue");
        let token = crate::token::encode_decision_token(&decision);

        let cancel = CancelToken::new();
        let ctx = DispatchContext {
            cancel: Some(cancel.clone()),
            ..DispatchContext::default()
        };
        // Cancel is observed right after the intent is minted and the
        // lifecycle moves to `executing`, before the executor call.
        cancel.cancel();
        let err = bridge.dispatch(&ctx, "call_mcp_tool", params, Some(&token)).unwrap_err();
        assert!(matches!(err, KernelError::Canceled(_)));
    }
}
