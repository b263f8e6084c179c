//! Confluent reducer over sorted inputs: applies a named conflict policy
//! deterministically, independent of arrival order, and builds the
//! `DependencyGraph` alongside it.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod graph;
mod reducer;

pub use error::ReducerError;
pub use error::Result;
pub use graph::DependencyGraph;
pub use graph::Edge;
pub use graph::EdgeKind;
pub use reducer::AppliedEntry;
pub use reducer::ConflictPolicy;
pub use reducer::ConflictRecord;
pub use reducer::ReduceResult;
pub use reducer::ReducerInput;
pub use reducer::conflicts_multiset_key;
pub use reducer::reduce;
