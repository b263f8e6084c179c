//! Decision records and execution intents:
//! a signed PDP verdict binding a subject/action/resource triple to an
//! effect's canonical digest, and a short-lived single-use intent minted
//! from an `ALLOW` decision that binds execution to exactly one decision
//! and one effect digest.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod decision;
mod error;
mod intent;

pub use decision::DecisionRecord;
pub use decision::Intervention;
pub use decision::UnsignedDecision;
pub use decision::Verdict;
pub use error::DecisionError;
pub use error::Result;
pub use intent::ExecutionIntent;
pub use intent::IntentStore;
pub use intent::mint_intent;
pub use intent::verify_intent;
