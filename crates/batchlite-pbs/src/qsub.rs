//! Job submission via qsub.

use crate::error::PbsError;
use crate::scheduler::PbsScheduler;
use crate::script;
use batchlite_core::{Job, StageSpec, Submission, Task};
use batchlite_parsers::{CommandRunner, command_line, non_empty_string};
use camino::Utf8Path;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::time::Instant;
use tempfile::NamedTempFile;

/// What to submit.
pub enum SubmitTarget<'a> {
    /// One job, staged with its task's inputs and output directory
    Job {
        job: &'a mut Job,
        stage: &'a StageSpec,
    },
    /// Every job of a task, in order
    Task(&'a mut Task),
}

impl<R: CommandRunner> PbsScheduler<R> {
    pub async fn submit(&self, target: SubmitTarget<'_>) -> Result<Submission, PbsError> {
        match target {
            SubmitTarget::Job { job, stage } => self.submit_job(job, stage).await,
            SubmitTarget::Task(task) => self.submit_task(task).await,
        }
    }

    /// Submit every job of `task` in order.
    ///
    /// Stops at the first failure. Jobs submitted before it keep their
    /// scheduler ids, and the error is a `PartialSubmission` carrying their
    /// mapping. A failure on the first job is returned as is.
    pub async fn submit_task(&self, task: &mut Task) -> Result<Submission, PbsError> {
        let stage = task.stage();
        let mut submission = Submission::default();

        for job in &mut task.jobs {
            let single = match self.submit_job(job, &stage).await {
                Ok(single) => single,
                Err(err) if submission.mapping.is_empty() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        "Submission of task {} stopped after {} job(s)",
                        task.name,
                        submission.mapping.len()
                    );
                    return Err(PbsError::PartialSubmission {
                        submitted: submission.mapping,
                        source: Box::new(err),
                    });
                }
            };
            for name in submission.merge(single) {
                tracing::warn!(
                    "Job name {} appears more than once in task {}; keeping the latest scheduler id",
                    name,
                    task.name
                );
            }
        }

        Ok(submission)
    }

    /// Render, write and qsub the scripts for one job.
    pub async fn submit_job(&self, job: &mut Job, stage: &StageSpec) -> Result<Submission, PbsError> {
        self.prepare_directories().await?;

        let scripts = script::render(job, stage, &self.config).await?;
        for line in scripts.wrapper.lines() {
            tracing::debug!(" CONFIG: {}", line);
        }

        // Both files are removed when dropped, whatever happens below.
        let wrapper = write_script(&self.config.script_dir, "pbs.", scripts.wrapper, 0o600).await?;
        let _epilogue =
            write_script(&self.config.script_dir, "epilogue.", scripts.epilogue, 0o700).await?;

        let args = vec![wrapper.path().display().to_string()];
        let command = &self.config.submit_command;
        tracing::debug!("Submitting {} with {}", job.name, command_line(command, &args));

        let started = Instant::now();
        let output = self.runner.run(command, &args).await?;
        tracing::debug!("{} finished in {:.2?}", command, started.elapsed());

        if !output.success() {
            tracing::error!("Error in submission of job {}", job.name);
            tracing::error!("{} stderr: {}", command, output.stderr.trim_end());
            return Err(PbsError::Submission {
                stderr: output.stderr,
                exit_code: output.exit_code,
            });
        }

        let Some(scheduler_id) = non_empty_string(&output.stdout) else {
            tracing::error!("{} printed no job id for {}", command, job.name);
            return Err(PbsError::Submission {
                stderr: format!("{command} printed no job id; stderr: {}", output.stderr),
                exit_code: output.exit_code,
            });
        };

        tracing::info!("Submitted job {} as {}", job.name, scheduler_id);
        job.running_job.scheduler_id = Some(scheduler_id.clone());
        job.running_job.submitted_at = Some(Utc::now());

        Ok(Submission {
            mapping: BTreeMap::from([(job.name.clone(), scheduler_id)]),
            bulk_id: None,
            service: None,
        })
    }

    async fn prepare_directories(&self) -> Result<(), PbsError> {
        for dir in [
            &self.config.script_dir,
            &self.config.stage_dir,
            &self.config.result_dir,
        ] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(PbsError::io(format!("Creating {dir}")))?;
        }
        Ok(())
    }
}

/// Write `content` to a new temporary file in `dir` with the given mode.
async fn write_script(
    dir: &Utf8Path,
    prefix: &'static str,
    content: String,
    mode: u32,
) -> Result<NamedTempFile, PbsError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<NamedTempFile, PbsError> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".sh")
            .tempfile_in(&dir)
            .map_err(PbsError::io(format!("Creating script in {dir}")))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.flush())
            .map_err(PbsError::io(format!("Writing {}", file.path().display())))?;
        fs::set_permissions(file.path(), fs::Permissions::from_mode(mode))
            .map_err(PbsError::io(format!("Setting permissions of {}", file.path().display())))?;
        Ok(file)
    })
    .await
    .map_err(|e| PbsError::Io {
        context: "Writing job script".to_string(),
        source: std::io::Error::other(e),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, submitted, test_config, two_job_task};
    use batchlite_parsers::CommandOutput;
    use tempfile::TempDir;

    fn script_dir_is_empty(scheduler: &PbsScheduler<FakeRunner>) -> bool {
        fs::read_dir(&scheduler.config().script_dir)
            .unwrap()
            .next()
            .is_none()
    }

    #[tokio::test]
    async fn test_submit_task() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new([submitted("  101.pbs01\n"), submitted("102.pbs01\n")]);
        let scheduler = PbsScheduler::with_runner(test_config(&temp, |_| {}), runner);
        let mut task = two_job_task();

        let submission = scheduler.submit(SubmitTarget::Task(&mut task)).await.unwrap();

        assert_eq!(submission.mapping.len(), 2);
        assert_eq!(submission.mapping["job_1"], "101.pbs01");
        assert_eq!(submission.mapping["job_2"], "102.pbs01");
        assert!(submission.bulk_id.is_none());
        assert!(submission.service.is_none());
        assert_eq!(task.jobs[0].running_job.scheduler_id.as_deref(), Some("101.pbs01"));
        assert!(task.jobs[1].running_job.submitted_at.is_some());

        let calls = scheduler.runner().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "qsub");
        assert_eq!(calls[0].args.len(), 1);
        let script = calls[0].script.as_deref().expect("script readable during qsub");
        assert!(script.contains("./run.sh --seed 1"));
        assert!(calls[1].script.as_deref().unwrap().contains("./run.sh --seed 2"));

        assert!(script_dir_is_empty(&scheduler));
        assert!(scheduler.config().stage_dir.is_dir());
    }

    #[tokio::test]
    async fn test_submit_single_job() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new([submitted("7.server")]);
        let scheduler = PbsScheduler::with_runner(test_config(&temp, |_| {}), runner);
        let mut task = two_job_task();
        let stage = task.stage();

        let submission = scheduler
            .submit(SubmitTarget::Job {
                job: &mut task.jobs[1],
                stage: &stage,
            })
            .await
            .unwrap();

        assert_eq!(
            submission.mapping,
            BTreeMap::from([("job_2".to_string(), "7.server".to_string())])
        );
        assert!(!task.jobs[0].running_job.is_valid());
        assert_eq!(scheduler.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_failure() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new([
            submitted("101.pbs01"),
            CommandOutput::new("", "qsub: Unauthorized Request\n", 159),
        ]);
        let scheduler = PbsScheduler::with_runner(test_config(&temp, |_| {}), runner);
        let mut task = two_job_task();

        let err = scheduler.submit_task(&mut task).await.unwrap_err();
        let (submitted, source) = match err {
            PbsError::PartialSubmission { submitted, source } => (submitted, source),
            other => panic!("unexpected error {other:?}"),
        };
        assert_eq!(
            submitted,
            BTreeMap::from([("job_1".to_string(), "101.pbs01".to_string())])
        );
        match *source {
            PbsError::Submission { stderr, exit_code } => {
                assert_eq!(stderr, "qsub: Unauthorized Request\n");
                assert_eq!(exit_code, Some(159));
            }
            other => panic!("unexpected cause {other:?}"),
        }

        // The first job stays submitted, the second never got an id.
        assert!(task.jobs[0].running_job.is_valid());
        assert!(task.jobs[1].running_job.scheduler_id.is_none());
        assert!(script_dir_is_empty(&scheduler));
    }

    #[tokio::test]
    async fn test_submit_without_job_id() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new([submitted("  \n")]);
        let scheduler = PbsScheduler::with_runner(test_config(&temp, |_| {}), runner);
        let mut task = two_job_task();
        let stage = task.stage();

        let result = scheduler.submit_job(&mut task.jobs[0], &stage).await;
        assert!(matches!(result, Err(PbsError::Submission { .. })));
        assert!(task.jobs[0].running_job.scheduler_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_names_keep_latest_id() {
        let temp = TempDir::new().unwrap();
        let runner = FakeRunner::new([submitted("1.pbs"), submitted("2.pbs")]);
        let scheduler = PbsScheduler::with_runner(test_config(&temp, |_| {}), runner);
        let mut task = two_job_task();
        task.jobs[1].name = task.jobs[0].name.clone();

        let submission = scheduler.submit_task(&mut task).await.unwrap();
        assert_eq!(submission.mapping.len(), 1);
        assert_eq!(submission.mapping["job_1"], "2.pbs");
    }

    #[tokio::test]
    async fn test_missing_proxy_submits_nothing() {
        let temp = TempDir::new().unwrap();
        let missing = camino::Utf8PathBuf::from_path_buf(temp.path().join("nope")).unwrap();
        let config = test_config(&temp, |opts| {
            opts.use_proxy = true;
            opts.proxy_path = Some(missing);
        });
        let scheduler = PbsScheduler::with_runner(config, FakeRunner::new([]));
        let mut task = two_job_task();

        // Nothing was submitted, so the cause is returned unwrapped.
        let result = scheduler.submit_task(&mut task).await;
        assert!(matches!(result, Err(PbsError::ProxyNotFound(_))));
        assert!(scheduler.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_write_script_sets_mode() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        let file = write_script(dir, "epilogue.", "#!/bin/sh\n".to_string(), 0o700)
            .await
            .unwrap();
        let path = file.path().to_path_buf();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\n");

        drop(file);
        assert!(!path.exists());
    }
}
