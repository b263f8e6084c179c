use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `{policy_id, base_ms, max_ms, max_jitter_ms, max_attempts}`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub policy_id: String,
    pub base_ms: u64,
    pub max_ms: u64,
    pub max_jitter_ms: u64,
    pub max_attempts: u32,
}

/// Deterministic backoff:
/// `delay(attempt) = min(base_ms * 2^attempt, max_ms) + jitter`, where
/// `jitter = HMAC-SHA256(policy_id ‖ adapter_id ‖ effect_id ‖ attempt ‖
/// env_snapshot_hash)[0:8] mod max_jitter_ms`. The exponent is capped at
/// 30 to avoid overflow.
pub fn delay_ms(
    policy: &RetryPolicy,
    adapter_id: &str,
    effect_id: &str,
    attempt: u32,
    env_snapshot_hash: &str,
) -> u64 {
    let exponent = attempt.min(30);
    let scaled = policy.base_ms.saturating_mul(1u64 << exponent);
    let capped = scaled.min(policy.max_ms);
    let jitter = jitter_ms(policy, adapter_id, effect_id, attempt, env_snapshot_hash);
    capped.saturating_add(jitter)
}

fn jitter_ms(
    policy: &RetryPolicy,
    adapter_id: &str,
    effect_id: &str,
    attempt: u32,
    env_snapshot_hash: &str,
) -> u64 {
    if policy.max_jitter_ms == 0 {
        return 0;
    }
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(policy.policy_id.as_bytes()).expect("hmac accepts any key length");
    mac.update(adapter_id.as_bytes());
    mac.update(b"\0");
    mac.update(effect_id.as_bytes());
    mac.update(b"\0");
    mac.update(&attempt.to_be_bytes());
    mac.update(b"\0");
    mac.update(env_snapshot_hash.as_bytes());
    let tag = mac.finalize().into_bytes();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&tag[0..8]);
    u64::from_be_bytes(bytes) % policy.max_jitter_ms
}

/// One scheduled attempt within a [`RetryPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAttempt {
    pub attempt: u32,
    pub scheduled_at_ms: u64,
}

/// `RetryPlan`: the full schedule for a given
/// `(effect_id, policy, env_snapshot_hash, start_time)`, content-addressed
/// and committed before the first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPlan {
    pub retry_plan_id: String,
    pub effect_id: String,
    pub policy_id: String,
    pub start_time_ms: u64,
    pub env_snapshot_hash: String,
    pub attempts: Vec<ScheduledAttempt>,
}

/// Builds the immutable retry plan for an effect, one scheduled timestamp
/// per attempt up to `policy.max_attempts` (attempts are zero-indexed).
pub fn build_retry_plan(
    policy: &RetryPolicy,
    adapter_id: &str,
    effect_id: &str,
    env_snapshot_hash: &str,
    start_time_ms: u64,
) -> RetryPlan {
    let mut attempts = Vec::with_capacity(policy.max_attempts as usize);
    let mut cursor = start_time_ms;
    for attempt in 0..policy.max_attempts {
        attempts.push(ScheduledAttempt {
            attempt,
            scheduled_at_ms: cursor,
        });
        cursor = cursor.saturating_add(delay_ms(
            policy,
            adapter_id,
            effect_id,
            attempt,
            env_snapshot_hash,
        ));
    }
    let retry_plan_id = retry_plan_id(policy, effect_id, start_time_ms, env_snapshot_hash);
    RetryPlan {
        retry_plan_id,
        effect_id: effect_id.to_string(),
        policy_id: policy.policy_id.clone(),
        start_time_ms,
        env_snapshot_hash: env_snapshot_hash.to_string(),
        attempts,
    }
}

/// `"rp_" + H(effect_id ‖ policy_id ‖ start_time ‖ env_snapshot_hash)[0:8]`.
fn retry_plan_id(
    policy: &RetryPolicy,
    effect_id: &str,
    start_time_ms: u64,
    env_snapshot_hash: &str,
) -> String {
    use sha2::Digest;
    let mut hasher = Sha256::new();
    hasher.update(effect_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(policy.policy_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(start_time_ms.to_be_bytes());
    hasher.update(b"\0");
    hasher.update(env_snapshot_hash.as_bytes());
    let digest = hasher.finalize();
    format!("rp_{}", &hex::encode(digest)[0..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            policy_id: "policy-1".into(),
            base_ms: 100,
            max_ms: 10_000,
            max_jitter_ms: 50,
            max_attempts: 5,
        }
    }

    #[test]
    fn backoff_is_deterministic_for_same_inputs() {
        let p = policy();
        let a = delay_ms(&p, "adapter-1", "effect-1", 2, "envhash");
        let b = delay_ms(&p, "adapter-1", "effect-1", 2, "envhash");
        assert_eq!(a, b);
    }

    #[test]
    fn backoff_changes_with_attempt_index() {
        let p = policy();
        let a0 = delay_ms(&p, "adapter-1", "effect-1", 0, "envhash");
        let a3 = delay_ms(&p, "adapter-1", "effect-1", 3, "envhash");
        assert!(a3 >= a0);
    }

    #[test]
    fn backoff_caps_at_max_ms_plus_jitter() {
        let p = policy();
        let d = delay_ms(&p, "adapter-1", "effect-1", 30, "envhash");
        assert!(d <= p.max_ms + p.max_jitter_ms);
    }

    #[test]
    fn retry_plan_id_is_deterministic() {
        let p = policy();
        let plan1 = build_retry_plan(&p, "adapter-1", "effect-1", "envhash", 1_000);
        let plan2 = build_retry_plan(&p, "adapter-1", "effect-1", "envhash", 1_000);
        assert_eq!(plan1.retry_plan_id, plan2.retry_plan_id);
        assert_eq!(plan1.attempts, plan2.attempts);
        assert!(plan1.retry_plan_id.starts_with("rp_"));
    }

    #[test]
    fn retry_plan_has_max_attempts_entries_zero_indexed() {
        let p = policy();
        let plan = build_retry_plan(&p, "adapter-1", "effect-1", "envhash", 0);
        assert_eq!(plan.attempts.len(), 5);
        assert_eq!(plan.attempts[0].attempt, 0);
        assert_eq!(plan.attempts[4].attempt, 4);
    }

    /// S4 — the literal scenario from spec §8: policy `{base=100,
    /// max=30000, jitter=1000}`, `effect_id="effect-001"`,
    /// `env="env-abc123"`, `attempt=0`; the delay produced twice is
    /// byte-identical.
    #[test]
    fn s4_backoff_scenario_is_byte_identical_across_runs() {
        let p = RetryPolicy {
            policy_id: "policy-s4".into(),
            base_ms: 100,
            max_ms: 30_000,
            max_jitter_ms: 1_000,
            max_attempts: 1,
        };
        let first = delay_ms(&p, "adapter-1", "effect-001", 0, "env-abc123");
        let second = delay_ms(&p, "adapter-1", "effect-001", 0, "env-abc123");
        assert_eq!(first, second);
    }

    /// S5 — the literal scenario from spec §8: `effect_id =
    /// "effect-reproducible-001"`, `env = "env-snapshot-hash-001"`,
    /// `start = 2024-06-15T10:00:00Z`, policy `{base=100, max=5000,
    /// jitter=50, attempts=3}`; the plan id and attempt timestamps match
    /// on re-computation.
    #[test]
    fn s5_retry_plan_scenario_is_reproducible() {
        use chrono::DateTime;
        use chrono::Utc;

        let p = RetryPolicy {
            policy_id: "policy-s5".into(),
            base_ms: 100,
            max_ms: 5_000,
            max_jitter_ms: 50,
            max_attempts: 3,
        };
        let start: DateTime<Utc> = DateTime::parse_from_rfc3339("2024-06-15T10:00:00Z")
            .expect("valid rfc3339")
            .with_timezone(&Utc);
        let start_ms = start.timestamp_millis().max(0) as u64;

        let plan1 = build_retry_plan(&p, "adapter-1", "effect-reproducible-001", "env-snapshot-hash-001", start_ms);
        let plan2 = build_retry_plan(&p, "adapter-1", "effect-reproducible-001", "env-snapshot-hash-001", start_ms);

        assert_eq!(plan1.retry_plan_id, plan2.retry_plan_id);
        assert_eq!(plan1.attempts, plan2.attempts);
        assert_eq!(plan1.attempts.len(), 3);
    }
}
