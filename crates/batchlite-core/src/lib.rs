//! Scheduler-independent job model for batchlite.
//!
//! Tasks, jobs and their runtime records, the normalized status vocabulary
//! shared by every backend, and the interface backends implement.

pub mod scheduler;
pub mod store;
pub mod types;

pub use scheduler::{BatchScheduler, Submission};
pub use store::{StoreError, TaskStore};
pub use types::{Job, JobStatus, RunningJob, StageSpec, Task};
