//! PBS job states and their normalized counterparts.

use crate::error::PbsError;
use batchlite_core::JobStatus;

/// State reported for jobs qstat no longer knows about.
pub const DONE_STATE: &str = "Done";

/// PBS job state as printed in `job_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbsJobState {
    /// E - exiting after having run
    Exiting,
    /// H - held
    Held,
    /// Q - queued
    Queued,
    /// R - running
    Running,
    /// S - suspended
    Suspended,
    /// T - being moved to a new location
    Transit,
    /// W - waiting for its execution time
    Waiting,
    /// C - completed (Torque keeps finished jobs for a while)
    Completed,
    /// Job record purged by the server
    Done,
}

impl PbsJobState {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "E" => Some(Self::Exiting),
            "H" => Some(Self::Held),
            "Q" => Some(Self::Queued),
            "R" => Some(Self::Running),
            "S" => Some(Self::Suspended),
            "T" => Some(Self::Transit),
            "W" => Some(Self::Waiting),
            "C" => Some(Self::Completed),
            DONE_STATE => Some(Self::Done),
            _ => None,
        }
    }

    pub fn to_job_status(&self) -> JobStatus {
        match self {
            Self::Exiting | Self::Running | Self::Suspended | Self::Transit => JobStatus::Running,
            Self::Held | Self::Queued | Self::Waiting => JobStatus::SystemSuspended,
            Self::Completed | Self::Done => JobStatus::ScheduledDone,
        }
    }
}

/// Translate a native PBS state code into the normalized status.
pub fn translate(native: &str) -> Result<JobStatus, PbsError> {
    PbsJobState::from_code(native)
        .map(|state| state.to_job_status())
        .ok_or_else(|| PbsError::UnknownNativeStatus(native.to_string()))
}
