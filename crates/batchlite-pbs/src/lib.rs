//! PBS/Torque integration for batchlite.
//!
//! Submit jobs via qsub, query them via qstat and cancel them via qdel.

pub mod config;
pub mod error;
pub mod qdel;
pub mod qstat;
pub mod qsub;
pub mod scheduler;
pub mod script;
pub mod status;

#[cfg(test)]
mod testing;

pub use config::{HostEnvironment, PbsConfig, PbsOptions};
pub use error::PbsError;
pub use qstat::{StatusParser, StatusRecord, XmlFragmentParser};
pub use qsub::SubmitTarget;
pub use scheduler::PbsScheduler;
pub use script::{RenderedScripts, preview, render, render_with_prefix, stage_proxy};
pub use status::{PbsJobState, translate};
