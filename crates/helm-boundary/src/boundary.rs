use std::collections::HashMap;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use tracing::warn;

use crate::effect_request::EffectRequest;
use crate::error::BoundaryError;
use crate::error::Result;
use crate::lifecycle::EffectLifecycle;

/// Default idempotency-map TTL when the request omits `window_seconds`.
pub const DEFAULT_IDEMPOTENCY_TTL_SECONDS: u64 = 86_400;

/// The PDP's verdict for one effect request, delivered through an
/// adapter the boundary never implements itself; policy evaluation is
/// consumed only through this interface.
pub enum PdpVerdict {
    Allow { decision_id: String },
    Deny { decision_id: Option<String>, reason: String },
    Error { detail: String },
}

pub trait PdpAdapter: Send + Sync {
    fn decide(&self, req: &EffectRequest) -> PdpVerdict;
}

struct IdempotencyEntry {
    effect_id: String,
    recorded_at: DateTime<Utc>,
    ttl_seconds: u64,
}

impl IdempotencyEntry {
    fn expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.recorded_at).num_seconds() >= self.ttl_seconds as i64
    }
}

/// Effect boundary: intake, idempotency, PDP binding, lifecycle state
/// machine. Each mutable collection is guarded by its own
/// coarse-grained lock; no lock is held across the PDP call.
pub struct EffectBoundary {
    lifecycles: Mutex<HashMap<String, EffectLifecycle>>,
    idempotency: Mutex<HashMap<String, IdempotencyEntry>>,
}

impl Default for EffectBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectBoundary {
    pub fn new() -> Self {
        EffectBoundary {
            lifecycles: Mutex::new(HashMap::new()),
            idempotency: Mutex::new(HashMap::new()),
        }
    }

    /// `CheckIdempotency(key) -> (exists, stored_effect_id)`.
    pub fn check_idempotency(&self, key: &str) -> (bool, Option<String>) {
        let now = Utc::now();
        let map = self.idempotency.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match map.get(key) {
            Some(entry) if !entry.expired(now) => (true, Some(entry.effect_id.clone())),
            _ => (false, None),
        }
    }

    /// `Submit(req) -> Lifecycle`. A second `Submit` with a matching
    /// `idempotency.key` returns the first submission's lifecycle
    /// unchanged: not an error, and the lifecycle does not advance.
    pub fn submit(&self, req: EffectRequest, pdp: &dyn PdpAdapter) -> Result<EffectLifecycle> {
        let req = req.validated()?;
        let now = req.submitted_at;

        {
            let mut idem = self.idempotency.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(entry) = idem.get(&req.idempotency.key) {
                if !entry.expired(now) {
                    let lifecycles = self.lifecycles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    return lifecycles
                        .get(&entry.effect_id)
                        .cloned()
                        .ok_or_else(|| BoundaryError::NotFound(entry.effect_id.clone()));
                }
            }
            idem.insert(
                req.idempotency.key.clone(),
                IdempotencyEntry {
                    effect_id: req.effect_id.clone(),
                    recorded_at: now,
                    ttl_seconds: req.idempotency.window_seconds.unwrap_or(DEFAULT_IDEMPOTENCY_TTL_SECONDS),
                },
            );
        }

        let mut lifecycle = EffectLifecycle::new(req.effect_id.clone());
        match pdp.decide(&req) {
            PdpVerdict::Allow { decision_id } => {
                lifecycle.approve(decision_id)?;
            }
            PdpVerdict::Deny { decision_id, reason } => {
                warn!(effect_id = %req.effect_id, %reason, "effect denied by PDP");
                lifecycle.deny(decision_id)?;
            }
            PdpVerdict::Error { detail } => {
                warn!(effect_id = %req.effect_id, %detail, "PDP call errored, denying");
                lifecycle.deny(None)?;
            }
        }

        let mut lifecycles = self.lifecycles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        lifecycles.insert(req.effect_id.clone(), lifecycle.clone());
        Ok(lifecycle)
    }

    /// Explicit transition when the PDP is out-of-band.
    pub fn approve(&self, effect_id: &str, decision_id: &str) -> Result<EffectLifecycle> {
        self.with_lifecycle(effect_id, |lc| lc.approve(decision_id))
    }

    pub fn deny(&self, effect_id: &str, decision_id: Option<String>, reason: &str) -> Result<EffectLifecycle> {
        warn!(effect_id, reason, "effect denied explicitly");
        self.with_lifecycle(effect_id, |lc| lc.deny(decision_id))
    }

    /// May only be called when state is `approved`.
    pub fn execute(&self, effect_id: &str, executed_at: DateTime<Utc>) -> Result<EffectLifecycle> {
        self.with_lifecycle(effect_id, |lc| lc.execute(executed_at))
    }

    /// May only be called from `executing`.
    pub fn complete(
        &self,
        effect_id: &str,
        evidence_pack_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<EffectLifecycle> {
        self.with_lifecycle(effect_id, |lc| lc.complete(evidence_pack_id, completed_at))
    }

    pub fn fail(&self, effect_id: &str) -> Result<EffectLifecycle> {
        warn!(effect_id, "effect execution failed");
        self.with_lifecycle(effect_id, |lc| lc.fail())
    }

    /// A cancelled ambient request context aborted the effect after
    /// execution had begun: recorded `failed` with cause `CANCELED`
    /// rather than left `executing`.
    pub fn fail_with_cause(&self, effect_id: &str, cause: &str) -> Result<EffectLifecycle> {
        warn!(effect_id, cause, "effect execution aborted");
        self.with_lifecycle(effect_id, |lc| lc.fail_with_cause(Some(cause)))
    }

    pub fn compensate(&self, effect_id: &str) -> Result<EffectLifecycle> {
        self.with_lifecycle(effect_id, |lc| lc.compensate())
    }

    pub fn get_lifecycle(&self, effect_id: &str) -> Result<EffectLifecycle> {
        let lifecycles = self.lifecycles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        lifecycles
            .get(effect_id)
            .cloned()
            .ok_or_else(|| BoundaryError::NotFound(effect_id.to_string()))
    }

    fn with_lifecycle(
        &self,
        effect_id: &str,
        f: impl FnOnce(&mut EffectLifecycle) -> Result<()>,
    ) -> Result<EffectLifecycle> {
        let mut lifecycles = self.lifecycles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let lifecycle = lifecycles
            .get_mut(effect_id)
            .ok_or_else(|| BoundaryError::NotFound(effect_id.to_string()))?;
        f(lifecycle)?;
        Ok(lifecycle.clone())
    }
}
