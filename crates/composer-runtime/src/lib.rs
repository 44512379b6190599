//! # composer-runtime
//!
//! Brings a composition up against a container runtime.
//!
//! Handles:
//! - **Backend**: The [`backend::RuntimeAdapter`] seam, a Docker CLI adapter, and a dry-run adapter.
//! - **Scheduler**: Batch-by-batch startup with readiness probing and fail-fast cancellation.
//! - **Report**: Per-service state and outcome of a run.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod backend;
pub mod report;
pub mod scheduler;

pub use backend::RuntimeAdapter;
pub use report::RunReport;
pub use scheduler::Scheduler;
