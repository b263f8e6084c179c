use std::collections::BTreeMap;

use helm_canon::Value;

use crate::error::ReducerError;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    FirstSuccess,
    LastWriteWins,
    VerifierWins,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::FirstSuccess => "first_success",
            ConflictPolicy::LastWriteWins => "last_write_wins",
            ConflictPolicy::VerifierWins => "verifier_wins",
        }
    }

    /// Parses the wire conflict-policy string. `quorum` is a recognized
    /// literal with no defined reduction algorithm, so it parses to a
    /// distinct error rather than an unknown-value error.
    pub fn parse(s: &str) -> Result<ConflictPolicy> {
        match s {
            "first_success" => Ok(ConflictPolicy::FirstSuccess),
            "last_write_wins" => Ok(ConflictPolicy::LastWriteWins),
            "verifier_wins" => Ok(ConflictPolicy::VerifierWins),
            "quorum" => Err(ReducerError::QuorumNotImplemented),
            other => Err(ReducerError::UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReducerInput {
    pub sequence_number: u64,
    pub key: String,
    pub value: Value,
    /// Stable sort key; ties broken by `sequence_number`.
    pub sort_key: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEntry {
    pub key: String,
    pub sequence_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub key: String,
    pub winner_seq: u64,
    pub loser_seq: u64,
}

#[derive(Debug, Clone)]
pub struct ReduceResult {
    pub state: BTreeMap<String, Value>,
    pub state_hash: String,
    pub applied: Vec<AppliedEntry>,
    pub conflicts: Vec<ConflictRecord>,
}

struct Owned {
    value: Value,
    sequence_number: u64,
}

/// Confluent reduction over sorted inputs: the output depends only on
/// the *set* of inputs and their sort keys, never on arrival order.
pub fn reduce(mut inputs: Vec<ReducerInput>, policy: ConflictPolicy) -> ReduceResult {
    inputs.sort_by(|a, b| {
        a.sort_key
            .cmp(&b.sort_key)
            .then_with(|| a.sequence_number.cmp(&b.sequence_number))
    });

    let mut state: BTreeMap<String, Owned> = BTreeMap::new();
    let mut applied = Vec::new();
    let mut conflicts = Vec::new();

    for input in inputs {
        match state.get(&input.key) {
            None => {
                applied.push(AppliedEntry {
                    key: input.key.clone(),
                    sequence_number: input.sequence_number,
                });
                state.insert(
                    input.key.clone(),
                    Owned {
                        value: input.value,
                        sequence_number: input.sequence_number,
                    },
                );
            }
            Some(current) => {
                let (keep_current, winner_seq, loser_seq) = match policy {
                    ConflictPolicy::FirstSuccess => {
                        (true, current.sequence_number, input.sequence_number)
                    }
                    ConflictPolicy::LastWriteWins => {
                        (false, input.sequence_number, current.sequence_number)
                    }
                    ConflictPolicy::VerifierWins => {
                        if input.sequence_number > current.sequence_number {
                            (false, input.sequence_number, current.sequence_number)
                        } else {
                            (true, current.sequence_number, input.sequence_number)
                        }
                    }
                };
                conflicts.push(ConflictRecord {
                    key: input.key.clone(),
                    winner_seq,
                    loser_seq,
                });
                if !keep_current {
                    applied.push(AppliedEntry {
                        key: input.key.clone(),
                        sequence_number: input.sequence_number,
                    });
                    state.insert(
                        input.key.clone(),
                        Owned {
                            value: input.value,
                            sequence_number: input.sequence_number,
                        },
                    );
                }
            }
        }
    }

    let final_state: BTreeMap<String, Value> =
        state.into_iter().map(|(k, owned)| (k, owned.value)).collect();
    let state_hash = helm_canon::hash(&Value::Object(final_state.clone()));

    ReduceResult {
        state: final_state,
        state_hash,
        applied,
        conflicts,
    }
}

/// Canonicalized comparison key for confluence tests: conflicts compare
/// as multisets sorted by `(key, winner_seq, loser_seq)`.
pub fn conflicts_multiset_key(conflicts: &[ConflictRecord]) -> Vec<(String, u64, u64)> {
    let mut keys: Vec<(String, u64, u64)> = conflicts
        .iter()
        .map(|c| (c.key.clone(), c.winner_seq, c.loser_seq))
        .collect();
    keys.sort();
    keys
}
