//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the gate and an external
//! system (the issue tracker, the host test framework). Implementations
//! live in `src/adapters/` and `src/harness.rs`.

pub mod test_info;
pub mod tracker;

pub use test_info::TestInfo;
pub use tracker::{IssueStatus, StatusTracker, TrackerFuture};
