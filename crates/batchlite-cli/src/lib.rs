//! CLI argument parsing for batchlite.

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "batchlite")]
#[command(about = "Submit, query and cancel jobs on a PBS/Torque cluster")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// PBS adapter configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory for generated job scripts (overrides jobScriptDir)
    #[arg(long, global = true)]
    pub script_dir: Option<Utf8PathBuf>,

    /// Directory PBS returns stdout/stderr to (overrides jobResDir)
    #[arg(long, global = true)]
    pub result_dir: Option<Utf8PathBuf>,

    /// Do not ship a grid proxy with the jobs
    #[arg(long, global = true)]
    pub no_proxy: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit every job of a task, or a single job
    Submit {
        /// Task file (JSON)
        task: Utf8PathBuf,

        /// Only submit the job with this name
        #[arg(long)]
        job: Option<String>,
    },
    /// Refresh the status of submitted jobs
    Query {
        /// Task file (JSON)
        task: Utf8PathBuf,
    },
    /// Cancel submitted jobs
    Kill {
        /// Task file (JSON)
        task: Utf8PathBuf,
    },
    /// Print the job script for one job without submitting it
    Render {
        /// Task file (JSON)
        task: Utf8PathBuf,

        #[arg(long)]
        job: String,
    },
}

impl Args {
    /// Default log filter for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
