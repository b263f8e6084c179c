//! Deterministic scheduler: a priority queue
//! ordered by `(scheduled_at, priority, sort_key, sequence_num)`, plus a
//! critical-path variant that partitions events into independent groups
//! and bin-packs them onto a bounded number of parallel lanes.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod critical_path;
mod event;
mod scheduler;

pub use critical_path::Group;
pub use critical_path::Lane;
pub use critical_path::partition_into_lanes;
pub use critical_path::stage_metric;
pub use event::SchedulerEvent;
pub use event::generate_event_id;
pub use scheduler::Scheduler;
pub use scheduler::SchedulerError;
pub use scheduler::Result;
