//! Adapter configuration.
//!
//! [`PbsOptions`] is what users write; [`PbsConfig`] is the resolved,
//! immutable form every operation reads. Host lookups (hostname, proxy
//! location, working directory) happen once, in [`HostEnvironment::detect`].

use crate::error::PbsError;
use batchlite_parsers::{non_empty_string, split_list};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Directory created under the working directory when no worker base is set.
pub const DEFAULT_STAGE_DIR: &str = "BATCHLITE-PBS";

/// Job name given to every submitted job.
pub const DEFAULT_JOB_NAME: &str = "BATCHLITE";

/// qstat exit code for a job the server no longer knows about.
pub const DEFAULT_NOT_FOUND_EXIT_CODE: i32 = 153;

/// Environment variable naming the user's grid proxy.
pub const PROXY_ENV_VAR: &str = "X509_USER_PROXY";

/// User-facing options, as read from a config file.
///
/// The legacy option names (`jobScriptDir`, `workernodebase`, ...) are
/// accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PbsOptions {
    /// Where job scripts are written before submission
    #[serde(alias = "jobScriptDir")]
    pub job_script_dir: Option<Utf8PathBuf>,

    /// Where PBS copies stdout/stderr back to, and where the proxy is staged
    #[serde(alias = "jobResDir")]
    pub job_res_dir: Option<Utf8PathBuf>,

    pub queue: String,

    /// Worker-side directory files are staged through
    #[serde(alias = "workernodebase")]
    pub worker_node_base: Option<Utf8PathBuf>,

    /// Host PBS copies files from and to; defaults to this host
    pub hostname: Option<String>,

    /// Comma-separated `-l` resource requests
    pub resources: String,

    pub use_proxy: bool,

    /// Proxy location; defaults to `$X509_USER_PROXY`, then `/tmp/x509up_u<uid>`
    pub proxy_path: Option<Utf8PathBuf>,

    #[serde(alias = "grouplist")]
    pub group_list: String,

    /// Let PBS stage files with stagein/stageout instead of copying them
    #[serde(alias = "forcetransferfiles")]
    pub force_transfer_files: bool,

    /// Value of the `#PBS -N` directive
    #[serde(alias = "jobNameTag")]
    pub job_name_tag: Option<String>,

    pub not_found_exit_code: i32,

    /// Abort scheduler commands after this many seconds
    pub command_timeout_secs: Option<u64>,

    pub submit_command: String,

    pub status_command: String,

    pub cancel_command: String,
}

impl Default for PbsOptions {
    fn default() -> Self {
        Self {
            job_script_dir: None,
            job_res_dir: None,
            queue: String::new(),
            worker_node_base: None,
            hostname: None,
            resources: String::new(),
            use_proxy: true,
            proxy_path: None,
            group_list: String::new(),
            force_transfer_files: false,
            job_name_tag: None,
            not_found_exit_code: DEFAULT_NOT_FOUND_EXIT_CODE,
            command_timeout_secs: None,
            submit_command: "qsub".to_string(),
            status_command: "qstat".to_string(),
            cancel_command: "qdel".to_string(),
        }
    }
}

/// Snapshot of the host facts configuration depends on.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub hostname: Option<String>,
    /// Value of `$X509_USER_PROXY`
    pub proxy_env: Option<String>,
    pub uid: u32,
    pub current_dir: Utf8PathBuf,
}

impl HostEnvironment {
    /// Look up the current host's facts.
    pub fn detect() -> Result<Self, PbsError> {
        let current_dir = std::env::current_dir().map_err(PbsError::io("Reading current directory"))?;
        let current_dir = Utf8PathBuf::try_from(current_dir).map_err(|e| {
            PbsError::InvalidArgument(format!("Current directory is not UTF-8: {e}"))
        })?;

        Ok(Self {
            hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
            proxy_env: std::env::var(PROXY_ENV_VAR).ok(),
            uid: current_uid(),
            current_dir,
        })
    }

    /// Proxy location used when none is configured.
    pub fn default_proxy_path(&self) -> Utf8PathBuf {
        match self.proxy_env.as_deref().and_then(non_empty_string) {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(format!("/tmp/x509up_u{}", self.uid)),
        }
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}

/// Resolved adapter configuration.
#[derive(Debug, Clone)]
pub struct PbsConfig {
    pub script_dir: Utf8PathBuf,
    pub result_dir: Utf8PathBuf,
    pub queue: Option<String>,
    pub worker_base: Utf8PathBuf,
    /// Local directory created before every submission
    pub stage_dir: Utf8PathBuf,
    pub hostname: String,
    pub resources: Vec<String>,
    /// Proxy to ship with every job; `None` when proxy use is off
    pub proxy: Option<Utf8PathBuf>,
    pub group_list: Option<String>,
    pub transfer_files: bool,
    pub job_name: String,
    pub not_found_exit_code: i32,
    pub command_timeout: Option<Duration>,
    /// Base for relative input and output paths
    pub working_dir: Utf8PathBuf,
    pub submit_command: String,
    pub status_command: String,
    pub cancel_command: String,
}

impl PbsConfig {
    pub fn resolve(options: PbsOptions, host: &HostEnvironment) -> Result<Self, PbsError> {
        let cwd = &host.current_dir;

        let script_dir = options
            .job_script_dir
            .ok_or_else(|| PbsError::InvalidArgument("jobScriptDir is required".to_string()))?;
        let result_dir = options
            .job_res_dir
            .ok_or_else(|| PbsError::InvalidArgument("jobResDir is required".to_string()))?;

        let hostname = options
            .hostname
            .as_deref()
            .and_then(non_empty_string)
            .or_else(|| host.hostname.as_deref().and_then(non_empty_string))
            .ok_or_else(|| {
                PbsError::InvalidArgument("Unable to determine the submit hostname".to_string())
            })?;

        let stage_dir = cwd.join(DEFAULT_STAGE_DIR);
        let worker_base = match options.worker_node_base {
            Some(base) if !base.as_str().trim().is_empty() => absolutize(cwd, &base),
            _ => stage_dir.clone(),
        };

        let proxy = options.use_proxy.then(|| match options.proxy_path {
            Some(path) => absolutize(cwd, &path),
            None => host.default_proxy_path(),
        });

        for (name, command) in [
            ("submit_command", &options.submit_command),
            ("status_command", &options.status_command),
            ("cancel_command", &options.cancel_command),
        ] {
            if command.trim().is_empty() {
                return Err(PbsError::InvalidArgument(format!("{name} must not be empty")));
            }
        }

        Ok(Self {
            script_dir: absolutize(cwd, &script_dir),
            result_dir: absolutize(cwd, &result_dir),
            queue: non_empty_string(&options.queue),
            worker_base,
            stage_dir,
            hostname,
            resources: split_list(&options.resources)
                .into_iter()
                .map(String::from)
                .collect(),
            proxy,
            group_list: non_empty_string(&options.group_list),
            transfer_files: options.force_transfer_files,
            job_name: options
                .job_name_tag
                .as_deref()
                .and_then(non_empty_string)
                .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
            not_found_exit_code: options.not_found_exit_code,
            command_timeout: options.command_timeout_secs.map(Duration::from_secs),
            working_dir: cwd.clone(),
            submit_command: options.submit_command,
            status_command: options.status_command,
            cancel_command: options.cancel_command,
        })
    }
}

/// Join relative paths onto `base`.
pub(crate) fn absolutize(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
