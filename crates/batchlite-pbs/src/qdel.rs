//! Job cancellation via qdel.

use crate::error::PbsError;
use crate::scheduler::PbsScheduler;
use batchlite_core::Task;
use batchlite_parsers::CommandRunner;

impl<R: CommandRunner> PbsScheduler<R> {
    /// Cancel every submitted job in `task`, in order.
    ///
    /// The first failure aborts the remaining jobs.
    pub async fn kill(&self, task: &Task) -> Result<(), PbsError> {
        for id in task
            .valid_jobs()
            .filter_map(|job| job.running_job.scheduler_id())
        {
            self.kill_job(id).await?;
        }
        Ok(())
    }

    /// Cancel a single job by scheduler id.
    pub async fn kill_job(&self, id: &str) -> Result<(), PbsError> {
        let command = &self.config.cancel_command;
        let output = self.runner.run(command, &[id.to_string()]).await?;

        if !output.success() {
            let combined = output.combined();
            tracing::error!("Error in job kill for {}", id);
            tracing::error!("{} output: {}", command, combined.trim_end());
            return Err(PbsError::Kill {
                job_id: id.to_string(),
                output: combined,
            });
        }

        tracing::info!("Killed job {}", id);
        Ok(())
    }
}
