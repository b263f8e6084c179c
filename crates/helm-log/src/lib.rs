//! Append-only hash-chained total-order event log. The determinism
//! contract is chain *structure*: the same envelopes committed in the
//! same order with the same externally supplied timestamps produce an
//! identical chain.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod log;
mod record;

pub use log::LogError;
pub use log::Result;
pub use log::TotalOrderLog;
pub use log::VerifyFault;
pub use record::GENESIS_HASH;
pub use record::TotalOrderEvent;
pub use record::decode_record;
pub use record::encode_record;
