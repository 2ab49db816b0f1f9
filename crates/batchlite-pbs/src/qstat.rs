//! Job status queries via qstat.

use crate::error::PbsError;
use crate::scheduler::PbsScheduler;
use crate::status::{DONE_STATE, translate};
use batchlite_core::Task;
use batchlite_parsers::{CommandRunner, command_line, extract_tag};
use chrono::Utc;

/// The two fields read from qstat output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Native PBS state code
    pub state: String,
    /// Execution host, empty if not reported
    pub exec_host: String,
}

/// Extracts a [`StatusRecord`] from `qstat -x` output.
pub trait StatusParser: Send + Sync {
    fn parse(&self, job_id: &str, output: &str) -> Result<StatusRecord, PbsError>;
}

/// Reads `<job_state>` and `<exec_host>` by their markers.
///
/// `qstat -x` prints an XML fragment; only the text between the first start
/// and end marker of each element is used. Blank output means the server has
/// already purged the job.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlFragmentParser;

impl StatusParser for XmlFragmentParser {
    fn parse(&self, job_id: &str, output: &str) -> Result<StatusRecord, PbsError> {
        if output.trim().is_empty() {
            return Ok(StatusRecord {
                state: DONE_STATE.to_string(),
                exec_host: String::new(),
            });
        }

        let state = extract_tag(output, "job_state").ok_or_else(|| {
            PbsError::MalformedToolOutput {
                job_id: job_id.to_string(),
                output: output.to_string(),
            }
        })?;
        let exec_host = extract_tag(output, "exec_host").unwrap_or_default();

        Ok(StatusRecord {
            state: state.trim().to_string(),
            exec_host: exec_host.trim().to_string(),
        })
    }
}

impl<R: CommandRunner> PbsScheduler<R> {
    /// Refresh the runtime record of every submitted job in `task`.
    ///
    /// Jobs are queried in order; the first failure aborts the pass and
    /// leaves later jobs untouched.
    pub async fn query(&self, task: &mut Task) -> Result<(), PbsError> {
        for job in &mut task.jobs {
            let Some(id) = job.running_job.scheduler_id().map(str::to_string) else {
                continue;
            };

            let output = self.qstat(&id).await?;
            let record = self.parser.parse(&id, &output)?;
            let status = translate(&record.state)?;

            tracing::debug!(
                "Job {} ({}) is {} [{}] on {:?}",
                job.name,
                id,
                status,
                record.state,
                record.exec_host
            );

            let running = &mut job.running_job;
            running.status_scheduler = Some(record.state);
            running.status = Some(status);
            running.destination = record.exec_host;
            running.status_updated_at = Some(Utc::now());
        }

        Ok(())
    }

    /// Run qstat for one job, mapping "unknown job" to empty output.
    async fn qstat(&self, id: &str) -> Result<String, PbsError> {
        let command = &self.config.status_command;
        let args = vec!["-x".to_string(), id.to_string()];
        let output = self.runner.run(command, &args).await?;

        match output.exit_code {
            Some(0) => Ok(output.stdout),
            Some(code) if code == self.config.not_found_exit_code => {
                tracing::debug!("{} no longer knows job {}", command, id);
                Ok(String::new())
            }
            exit_code => {
                tracing::error!("Error in job query for {}", id);
                tracing::error!("{} stdout: {}", command_line(command, &args), output.stdout.trim_end());
                tracing::error!("{} stderr: {}", command_line(command, &args), output.stderr.trim_end());
                Err(PbsError::Query {
                    job_id: id.to_string(),
                    stderr: output.stderr,
                    exit_code,
                })
            }
        }
    }
}
