//! Interface implemented by every scheduler backend.

use crate::types::Task;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Result of a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    /// Job name to scheduler id
    pub mapping: BTreeMap<String, String>,

    /// Identifier of a bulk submission, for schedulers that have one
    pub bulk_id: Option<String>,

    /// Service endpoint the jobs were submitted through, if any
    pub service: Option<String>,
}

impl Submission {
    /// Merge another submission's mapping into this one.
    ///
    /// Returns the names that were already present; their old ids are replaced.
    pub fn merge(&mut self, other: Submission) -> Vec<String> {
        let mut replaced = Vec::new();
        for (name, id) in other.mapping {
            if self.mapping.insert(name.clone(), id).is_some() {
                replaced.push(name);
            }
        }
        replaced
    }
}

/// A batch-system backend.
///
/// Operations mutate the caller's records in place. Query and kill stop at
/// the first job that fails.
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short backend name, e.g. "pbs".
    fn name(&self) -> &'static str;

    /// Submit every job of the task in order, setting their scheduler ids.
    async fn submit_task(&self, task: &mut Task) -> Result<Submission, Self::Error>;

    /// Refresh the runtime record of every submitted job.
    async fn query(&self, task: &mut Task) -> Result<(), Self::Error>;

    /// Cancel every submitted job.
    async fn kill(&self, task: &Task) -> Result<(), Self::Error>;
}
