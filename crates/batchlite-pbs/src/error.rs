//! Errors raised by the PBS backend.

use batchlite_parsers::CommandError;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PbsError {
    #[error("Proxy not found at {0}")]
    ProxyNotFound(Utf8PathBuf),
    #[error("Job submission failed ({}): {stderr}", exit_status(.exit_code))]
    Submission {
        stderr: String,
        exit_code: Option<i32>,
    },
    /// A task submission stopped partway. `submitted` maps the names of the
    /// jobs that did reach the scheduler to their ids.
    #[error("Submission stopped after {} job(s): {source}", .submitted.len())]
    PartialSubmission {
        submitted: BTreeMap<String, String>,
        #[source]
        source: Box<PbsError>,
    },
    #[error("Status query for job {job_id} failed ({}): {stderr}", exit_status(.exit_code))]
    Query {
        job_id: String,
        stderr: String,
        exit_code: Option<i32>,
    },
    #[error("Failed to kill job {job_id}: {output}")]
    Kill { job_id: String, output: String },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown PBS job state: {0:?}")]
    UnknownNativeStatus(String),
    #[error("No job state in status output for job {job_id}: {output}")]
    MalformedToolOutput { job_id: String, output: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl PbsError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}
