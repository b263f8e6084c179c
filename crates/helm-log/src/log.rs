use std::sync::Mutex;

use thiserror::Error;

use crate::record::GENESIS_HASH;
use crate::record::TotalOrderEvent;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("position {0} is out of range")]
    OutOfRange(u64),

    #[error("range [{start}, {end}) is invalid")]
    InvalidRange { start: u64, end: u64 },
}

/// A specific fault from `Verify`, identifying the broken position
/// rather than just returning true/false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFault {
    HashMismatch { position: u64 },
    PrevHashMismatch { position: u64 },
}

/// Append-only hash-chained event log.
///
/// A single coarse-grained lock guards the vector, held only for the
/// duration of the append/read itself.
pub struct TotalOrderLog {
    events: Mutex<Vec<TotalOrderEvent>>,
}

impl Default for TotalOrderLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TotalOrderLog {
    pub fn new() -> Self {
        TotalOrderLog {
            events: Mutex::new(Vec::new()),
        }
    }

    /// `Commit(envelope, loop_id) -> TotalOrderEvent`. `committed_at_nanos`
    /// is supplied by the caller: the log never reads the wall clock so
    /// tests can inject a deterministic clock.
    pub fn commit(
        &self,
        envelope: Vec<u8>,
        committed_at_nanos: i64,
        loop_id: Option<String>,
    ) -> TotalOrderEvent {
        let mut events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let position = events.len() as u64;
        let previous_hash = events
            .last()
            .map(|e| e.commit_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let commit_hash = TotalOrderEvent::compute_hash(
            position,
            &previous_hash,
            &envelope,
            committed_at_nanos,
            loop_id.as_deref(),
        );
        let event = TotalOrderEvent {
            order_position: position,
            event_envelope: envelope,
            committed_at_nanos,
            commit_hash,
            previous_hash,
            loop_id,
        };
        events.push(event.clone());
        event
    }

    pub fn get(&self, position: u64) -> Result<TotalOrderEvent> {
        let events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events
            .get(position as usize)
            .cloned()
            .ok_or(LogError::OutOfRange(position))
    }

    pub fn range(&self, start: u64, end: u64) -> Result<Vec<TotalOrderEvent>> {
        if end < start {
            return Err(LogError::InvalidRange { start, end });
        }
        let events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let end = end.min(events.len() as u64);
        if start > end {
            return Err(LogError::InvalidRange { start, end });
        }
        Ok(events[start as usize..end as usize].to_vec())
    }

    pub fn head(&self) -> Option<TotalOrderEvent> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).last().cloned()
    }

    pub fn len(&self) -> u64 {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-derives each event's hash in `[start, end)` and checks chain
    /// linkage. Returns the first break found, if any.
    pub fn verify(&self, start: u64, end: u64) -> Result<Option<VerifyFault>> {
        let events = self.range(start, end)?;
        for (i, event) in events.iter().enumerate() {
            let position = start + i as u64;
            if event.recomputed_hash() != event.commit_hash {
                return Ok(Some(VerifyFault::HashMismatch { position }));
            }
            let expected_previous = if position == 0 {
                GENESIS_HASH.to_string()
            } else {
                self.get(position - 1)?.commit_hash
            };
            if event.previous_hash != expected_previous {
                return Ok(Some(VerifyFault::PrevHashMismatch { position }));
            }
        }
        Ok(None)
    }
}
