//! Task, job and runtime record types.

use batchlite_parsers::split_list;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized job status shared by all scheduler backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Executing, or about to exit
    #[serde(rename = "R")]
    Running,
    /// Queued, held or waiting on the scheduler
    #[serde(rename = "SS")]
    SystemSuspended,
    /// Finished as far as the scheduler is concerned
    #[serde(rename = "SD")]
    ScheduledDone,
}

impl JobStatus {
    /// Short code used in persisted records.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Running => "R",
            Self::SystemSuspended => "SS",
            Self::ScheduledDone => "SD",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ScheduledDone)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Mutable runtime record of one job at the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunningJob {
    /// Identifier assigned by the scheduler at submission
    pub scheduler_id: Option<String>,

    /// Normalized status from the last query
    pub status: Option<JobStatus>,

    /// Native scheduler state code from the last query
    pub status_scheduler: Option<String>,

    /// Last known execution host, empty if unknown
    pub destination: String,

    pub submitted_at: Option<DateTime<Utc>>,

    pub status_updated_at: Option<DateTime<Utc>>,
}

impl RunningJob {
    /// A record is valid once it carries a non-blank scheduler id.
    pub fn is_valid(&self) -> bool {
        self.scheduler_id().is_some()
    }

    /// Trimmed scheduler id, if valid.
    pub fn scheduler_id(&self) -> Option<&str> {
        self.scheduler_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One unit of execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Name, unique within its task
    pub name: String,

    /// Executable, relative to the job's working directory
    pub executable: String,

    /// Argument string passed verbatim to the executable
    #[serde(default)]
    pub arguments: String,

    /// Output file names, without directories
    #[serde(default)]
    pub output_files: Vec<String>,

    pub standard_output: String,

    pub standard_error: String,

    #[serde(default)]
    pub running_job: RunningJob,
}

/// Input and output locations shared by all jobs of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSpec {
    pub input_files: Vec<Utf8PathBuf>,
    pub output_directory: Utf8PathBuf,
}

/// A named collection of jobs sharing one input bundle and output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,

    /// Comma-joined list of input file paths
    #[serde(default)]
    pub global_sandbox: String,

    pub output_directory: Utf8PathBuf,

    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Task {
    /// Input files of the shared sandbox, blank entries dropped.
    pub fn input_files(&self) -> Vec<Utf8PathBuf> {
        split_list(&self.global_sandbox)
            .into_iter()
            .map(Utf8PathBuf::from)
            .collect()
    }

    /// Owned copy of the staging information, so jobs can be borrowed mutably
    /// while it is in use.
    pub fn stage(&self) -> StageSpec {
        StageSpec {
            input_files: self.input_files(),
            output_directory: self.output_directory.clone(),
        }
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    pub fn job_mut(&mut self, name: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.name == name)
    }

    /// Jobs that have been submitted and can be queried or killed.
    pub fn valid_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|job| job.running_job.is_valid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_job_validity() {
        let mut rj = RunningJob::default();
        assert!(!rj.is_valid());

        rj.scheduler_id = Some("   ".to_string());
        assert!(!rj.is_valid());

        rj.scheduler_id = Some(" 1234.pbs01 \n".to_string());
        assert!(rj.is_valid());
        assert_eq!(rj.scheduler_id(), Some("1234.pbs01"));
    }

    #[test]
    fn test_task_input_files() {
        let task = Task {
            name: "t".to_string(),
            global_sandbox: "/data/in.tgz, run.sh,,".to_string(),
            output_directory: "/data/out".into(),
            jobs: vec![],
        };
        assert_eq!(
            task.input_files(),
            vec![Utf8PathBuf::from("/data/in.tgz"), Utf8PathBuf::from("run.sh")]
        );
        assert!(Task::default().input_files().is_empty());
    }

    #[test]
    fn test_valid_jobs_keeps_order() {
        let mut task = Task::default();
        for (name, id) in [("a", Some("1")), ("b", None), ("c", Some("3"))] {
            task.jobs.push(Job {
                name: name.to_string(),
                running_job: RunningJob {
                    scheduler_id: id.map(String::from),
                    ..Default::default()
                },
                ..Default::default()
            });
        }
        let names: Vec<_> = task.valid_jobs().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert!(task.job("b").is_some());
        assert!(task.job_mut("z").is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(JobStatus::Running.to_string(), "R");
        assert_eq!(JobStatus::SystemSuspended.to_string(), "SS");
        assert_eq!(JobStatus::ScheduledDone.to_string(), "SD");
        assert!(JobStatus::ScheduledDone.is_terminal());
        assert_eq!(
            serde_json::to_string(&JobStatus::SystemSuspended).unwrap(),
            "\"SS\""
        );
    }
}
