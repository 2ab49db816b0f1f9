//! PBS wrapper and epilogue script generation.
//!
//! The wrapper stages the task's input sandbox into a job-private directory
//! under the worker base, runs the executable there and moves the declared
//! outputs back out. Every staged file carries a random prefix so jobs that
//! share a worker base cannot overwrite each other's files.
//!
//! With `transfer_files` set, PBS itself copies files using `stagein` and
//! `stageout` directives. Otherwise the script copies them, which requires
//! the worker base and output directory to be on a shared filesystem.

use crate::config::{PROXY_ENV_VAR, PbsConfig, absolutize};
use crate::error::PbsError;
use batchlite_core::{Job, StageSpec};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use tokio::fs;
use uuid::Uuid;

/// Environment variable PBS sets to the job's private cookie.
pub const JOB_COOKIE_VAR: &str = "PBS_JOBCOOKIE";

/// Name of the proxy copy placed in the result directory.
const PROXY_COPY_NAME: &str = "proxy.cert";

/// Rendered scripts for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScripts {
    /// Random prefix given to every staged file
    pub prefix: String,
    pub wrapper: String,
    pub epilogue: String,
}

/// Render the scripts for `job`, staging the proxy if proxy use is on.
pub async fn render(job: &Job, stage: &StageSpec, config: &PbsConfig) -> Result<RenderedScripts, PbsError> {
    let proxy = stage_proxy(config).await?;
    render_with_prefix(job, stage, config, &new_prefix(), proxy.as_deref())
}

/// Render the scripts for `job` without touching the filesystem.
///
/// The proxy must exist, but it is not copied. The wrapper refers to the
/// location `render` would have copied it to.
pub fn preview(job: &Job, stage: &StageSpec, config: &PbsConfig) -> Result<RenderedScripts, PbsError> {
    let proxy = proxy_target(config)?;
    render_with_prefix(job, stage, config, &new_prefix(), proxy.as_deref())
}

/// Copy the configured proxy into the result directory, readable by the
/// owner only.
pub async fn stage_proxy(config: &PbsConfig) -> Result<Option<Utf8PathBuf>, PbsError> {
    let (Some(source), Some(target)) = (config.proxy.as_ref(), proxy_target(config)?) else {
        return Ok(None);
    };

    fs::copy(source, &target)
        .await
        .map_err(PbsError::io(format!("Copying proxy to {target}")))?;
    fs::set_permissions(&target, Permissions::from_mode(0o600))
        .await
        .map_err(PbsError::io(format!("Restricting permissions of {target}")))?;
    tracing::debug!("Copied proxy {} to {}", source, target);

    Ok(Some(target))
}

/// Where the proxy copy goes, once the configured proxy is known to exist.
fn proxy_target(config: &PbsConfig) -> Result<Option<Utf8PathBuf>, PbsError> {
    let Some(source) = config.proxy.as_ref() else {
        return Ok(None);
    };
    if !source.is_file() {
        return Err(PbsError::ProxyNotFound(source.clone()));
    }
    Ok(Some(config.result_dir.join(PROXY_COPY_NAME)))
}

fn new_prefix() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Render the scripts using a fixed prefix and an already staged proxy.
pub fn render_with_prefix(
    job: &Job,
    stage: &StageSpec,
    config: &PbsConfig,
    prefix: &str,
    proxy: Option<&Utf8Path>,
) -> Result<RenderedScripts, PbsError> {
    for file in &job.output_files {
        if file.is_empty() || file.contains('/') {
            return Err(PbsError::InvalidArgument(format!(
                "Output file {file:?} of job {} must be a plain file name",
                job.name
            )));
        }
    }

    let host = &config.hostname;
    let worker_base = &config.worker_base;
    let output_dir = absolutize(&config.working_dir, &stage.output_directory);
    let staged = |name: &str| worker_base.join(format!("{prefix}-{name}"));

    let sandbox = stage
        .input_files
        .iter()
        .map(|file| -> Result<_, PbsError> {
            let file = absolutize(&config.working_dir, file);
            let name = base_name(&file)?.to_string();
            Ok((file, name))
        })
        .collect::<Result<Vec<_>, PbsError>>()?;

    let mut s = vec![
        "#!/bin/sh".to_string(),
        "# Generated by batchlite".to_string(),
        format!(
            "#PBS -e {host}:{}",
            config.result_dir.join(format!("tmp_{}", job.standard_error))
        ),
        format!(
            "#PBS -o {host}:{}",
            config.result_dir.join(format!("tmp_{}", job.standard_output))
        ),
        format!("#PBS -N {}", config.job_name),
    ];
    if let Some(queue) = &config.queue {
        s.push(format!("#PBS -q {queue}"));
    }
    for resource in &config.resources {
        s.push(format!("#PBS -l {resource}"));
    }
    if let Some(group_list) = &config.group_list {
        s.push(format!("#PBS -W group_list={group_list}"));
    }

    if !config.transfer_files {
        s.push("set -x".to_string());
    }

    // Stage in
    let proxy_input = proxy.map(|p| (p.to_path_buf(), PROXY_COPY_NAME.to_string()));
    for (file, name) in sandbox.iter().chain(proxy_input.iter()) {
        let target = staged(name.as_str());
        if config.transfer_files {
            s.push(format!("#PBS -W stagein={target}@{host}:{file}"));
        } else {
            s.push(format!("cp {file} {target}"));
        }
    }

    if config.transfer_files {
        for file in &job.output_files {
            s.push(format!(
                "#PBS -W stageout={}@{host}:{}",
                staged(file.as_str()),
                output_dir.join(file)
            ));
        }
        s.push("set -x".to_string());
    }

    s.extend([
        "pwd".to_string(),
        "ls -lah".to_string(),
        "BATCHLITE_OLD_DIRECTORY=`pwd`".to_string(),
        format!("BATCHLITE_PBS_WORKDIR={worker_base}"),
        format!("cd {worker_base}"),
        format!("BATCHLITE_WORKDIR=`pwd`/BATCHLITE-${JOB_COOKIE_VAR}"),
        "if [ ! -d $BATCHLITE_WORKDIR ] ; then".to_string(),
        "  mkdir -p $BATCHLITE_WORKDIR".to_string(),
        "fi".to_string(),
        "cd $BATCHLITE_WORKDIR".to_string(),
        "ls -lah".to_string(),
    ]);

    for (_, name) in &sandbox {
        s.push(format!(
            "mv $BATCHLITE_PBS_WORKDIR/{prefix}-{name} $BATCHLITE_WORKDIR/{name}"
        ));
    }
    if proxy.is_some() {
        s.push(format!(
            "mv $BATCHLITE_PBS_WORKDIR/{prefix}-{PROXY_COPY_NAME} $BATCHLITE_WORKDIR/{PROXY_COPY_NAME}"
        ));
        s.push(format!(
            "export {PROXY_ENV_VAR}=$BATCHLITE_WORKDIR/{PROXY_COPY_NAME}"
        ));
    }

    s.push(
        format!("./{} {}", job.executable, job.arguments)
            .trim_end()
            .to_string(),
    );

    // Stage out
    for file in &job.output_files {
        s.push(format!(
            "mv $BATCHLITE_WORKDIR/{file} $BATCHLITE_PBS_WORKDIR/{prefix}-{file}"
        ));
    }
    if !config.transfer_files {
        for file in &job.output_files {
            s.push(format!("mv -f {} {}", staged(file.as_str()), output_dir.join(file)));
        }
    }

    s.push("cd $BATCHLITE_OLD_DIRECTORY".to_string());
    s.push("rm -rf $BATCHLITE_WORKDIR".to_string());

    let epilogue = [
        "#!/bin/sh".to_string(),
        format!("cd {worker_base}"),
        format!("rm -fr BATCHLITE-${JOB_COOKIE_VAR}"),
        "touch $HOME/done.$1".to_string(),
    ];

    Ok(RenderedScripts {
        prefix: prefix.to_string(),
        wrapper: s.join("\n") + "\n",
        epilogue: epilogue.join("\n") + "\n",
    })
}

fn base_name(path: &Utf8Path) -> Result<&str, PbsError> {
    path.file_name()
        .ok_or_else(|| PbsError::InvalidArgument(format!("Input file {path:?} has no file name")))
}
