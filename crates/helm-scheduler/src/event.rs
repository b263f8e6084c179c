use sha2::Digest;
use sha2::Sha256;

#[derive(Debug, Clone)]
pub struct SchedulerEvent {
    pub event_id: String,
    pub event_type: String,
    pub scheduled_at: i64,
    /// Lower priority value sorts first ("lower = higher").
    pub priority: i64,
    pub sequence_num: u64,
    pub sort_key: String,
    pub loop_id: Option<String>,
}

/// A fresh opaque `event_id` for callers that don't derive one from
/// their own domain. `event_id` is caller-defined but opaque.
pub fn generate_event_id() -> String {
    format!("evt_{}", uuid::Uuid::new_v4())
}

impl SchedulerEvent {
    /// `H(event_id ‖ event_type ‖ loop_id)[0:16]`, used when the caller
    /// does not supply an explicit `sort_key`.
    pub fn derive_sort_key(event_id: &str, event_type: &str, loop_id: Option<&str>) -> String {
        let mut buf = Vec::new();
        buf.extend_from_slice(event_id.as_bytes());
        buf.extend_from_slice(event_type.as_bytes());
        buf.extend_from_slice(loop_id.unwrap_or("").as_bytes());
        let digest = Sha256::digest(&buf);
        hex::encode(&digest[..8])
    }

    pub(crate) fn order_key(&self) -> (i64, i64, &str, u64) {
        (self.scheduled_at, self.priority, self.sort_key.as_str(), self.sequence_num)
    }
}

impl PartialEq for SchedulerEvent {
    fn eq(&self, other: &Self) -> bool {
        self.order_key() == other.order_key()
    }
}
impl Eq for SchedulerEvent {}

impl PartialOrd for SchedulerEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchedulerEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.order_key().cmp(&other.order_key())
    }
}
