use serde::Deserialize;
use serde::Serialize;

/// `KernelConfig`: the kernel's tunables, all defaulted to fixed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Default admission policy: 600 rpm, burst 50.
    pub default_rpm: u32,
    pub default_burst: u32,
    /// Idempotency map TTL when a request omits `window_seconds`,
    /// resolved as 24h (see DESIGN.md).
    pub idempotency_ttl_seconds: u64,
    /// Execution intent lifetime; fixed at 5 minutes and not actually
    /// tunable, kept here only for observability.
    pub intent_ttl_seconds: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            default_rpm: 600,
            default_burst: 50,
            idempotency_ttl_seconds: helm_boundary::DEFAULT_IDEMPOTENCY_TTL_SECONDS,
            intent_ttl_seconds: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specified_values() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.default_rpm, 600);
        assert_eq!(cfg.default_burst, 50);
        assert_eq!(cfg.idempotency_ttl_seconds, 86_400);
        assert_eq!(cfg.intent_ttl_seconds, 300);
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let json = r#"{"default_rpm": 1200}"#;
        let cfg: KernelConfig = serde_json::from_str(json).expect("deserialize");
        assert_eq!(cfg.default_rpm, 1200);
        assert_eq!(cfg.default_burst, 50);
    }
}
