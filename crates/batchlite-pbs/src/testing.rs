//! Test fixtures: a scripted command runner and sample tasks.

use crate::config::{HostEnvironment, PbsConfig, PbsOptions};
use async_trait::async_trait;
use batchlite_core::{Job, Task};
use batchlite_parsers::{CommandError, CommandOutput, CommandRunner};
use camino::Utf8PathBuf;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub program: String,
    pub args: Vec<String>,
    /// Contents of the last argument, if it named a file at call time
    pub script: Option<String>,
}

/// Returns canned outputs in order and records every call.
#[derive(Default)]
pub(crate) struct FakeRunner {
    responses: Mutex<VecDeque<CommandOutput>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRunner {
    pub fn new(responses: impl IntoIterator<Item = CommandOutput>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, CommandError> {
        let script = args
            .last()
            .filter(|arg| Path::new(arg).is_file())
            .and_then(|arg| std::fs::read_to_string(arg).ok());
        self.calls.lock().unwrap().push(Call {
            program: program.to_string(),
            args: args.to_vec(),
            script,
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CommandError::Execution {
                command: program.to_string(),
                error: "no scripted response left".to_string(),
            })
    }
}

/// Successful qsub output.
pub(crate) fn submitted(id: &str) -> CommandOutput {
    CommandOutput::new(id, "", 0)
}

/// Config rooted in `temp`, without proxy use, tweaked by `adjust`.
pub(crate) fn test_config(temp: &TempDir, adjust: impl FnOnce(&mut PbsOptions)) -> PbsConfig {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let result_dir = root.join("results");
    std::fs::create_dir_all(&result_dir).unwrap();

    let mut options = PbsOptions {
        job_script_dir: Some(root.join("scripts")),
        job_res_dir: Some(result_dir),
        use_proxy: false,
        ..Default::default()
    };
    adjust(&mut options);

    let host = HostEnvironment {
        hostname: Some("submit.example.org".to_string()),
        proxy_env: None,
        uid: 1000,
        current_dir: root,
    };
    PbsConfig::resolve(options, &host).unwrap()
}

/// Two jobs sharing a sandbox, the second with two outputs.
pub(crate) fn two_job_task() -> Task {
    let job = |n: u32, outputs: &[&str]| Job {
        name: format!("job_{n}"),
        executable: "run.sh".to_string(),
        arguments: format!("--seed {n}"),
        output_files: outputs.iter().map(|s| s.to_string()).collect(),
        standard_output: format!("job_{n}.out"),
        standard_error: format!("job_{n}.err"),
        ..Default::default()
    };

    Task {
        name: "analysis".to_string(),
        global_sandbox: "/data/input/sandbox.tgz,/data/input/run.sh".to_string(),
        output_directory: "/data/output".into(),
        jobs: vec![job(1, &["out.root"]), job(2, &["out.root", "hist.root"])],
    }
}

/// Give the task's jobs scheduler ids, by position.
pub(crate) fn with_ids(mut task: Task, ids: &[Option<&str>]) -> Task {
    for (job, id) in task.jobs.iter_mut().zip(ids) {
        job.running_job.scheduler_id = id.map(String::from);
    }
    task
}
