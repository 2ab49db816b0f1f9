//! Subcommand implementations.

use batchlite_cli::{Args, Command};
use batchlite_core::{Task, TaskStore};
use batchlite_pbs::{HostEnvironment, PbsConfig, PbsError, PbsOptions, PbsScheduler, SubmitTarget, preview};
use camino::Utf8Path;
use miette::{IntoDiagnostic, Result, WrapErr, miette};
use std::collections::BTreeMap;

pub async fn run(args: Args) -> Result<()> {
    let options = load_options(&args)?;
    let host = HostEnvironment::detect().into_diagnostic()?;
    let config = PbsConfig::resolve(options, &host)
        .into_diagnostic()
        .wrap_err("Invalid PBS configuration")?;
    let scheduler = PbsScheduler::new(config);

    match args.command {
        Command::Submit { task, job } => submit(&scheduler, &task, job.as_deref()).await,
        Command::Query { task } => query(&scheduler, &task).await,
        Command::Kill { task } => kill(&scheduler, &task).await,
        Command::Render { task, job } => print_scripts(&scheduler, &task, &job),
    }
}

/// Read the config file, if any, and apply command-line overrides.
fn load_options(args: &Args) -> Result<PbsOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("Reading {path}"))?;
            toml::from_str::<PbsOptions>(&content)
                .into_diagnostic()
                .wrap_err_with(|| format!("Parsing {path}"))?
        }
        None => PbsOptions::default(),
    };

    if let Some(dir) = &args.script_dir {
        options.job_script_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.result_dir {
        options.job_res_dir = Some(dir.clone());
    }
    if args.no_proxy {
        options.use_proxy = false;
    }

    Ok(options)
}

fn load_task(path: &Utf8Path) -> Result<(TaskStore, Task)> {
    let store = TaskStore::new(path);
    let task = store
        .load()
        .into_diagnostic()
        .wrap_err_with(|| format!("Loading task from {path}"))?;
    Ok((store, task))
}

fn save_task(store: &TaskStore, task: &Task) -> Result<()> {
    store
        .save(task)
        .into_diagnostic()
        .wrap_err_with(|| format!("Saving task to {}", store.path()))
}

async fn submit(scheduler: &PbsScheduler, path: &Utf8Path, job: Option<&str>) -> Result<()> {
    let (store, mut task) = load_task(path)?;

    let result = match job {
        Some(name) => {
            let stage = task.stage();
            let task_name = task.name.clone();
            let job = task
                .job_mut(name)
                .ok_or_else(|| miette!("No job named {name} in task {task_name}"))?;
            scheduler.submit(SubmitTarget::Job { job, stage: &stage }).await
        }
        None => scheduler.submit(SubmitTarget::Task(&mut task)).await,
    };

    // Jobs submitted before a failure keep their ids.
    save_task(&store, &task)?;
    if let Err(PbsError::PartialSubmission { submitted, .. }) = &result {
        print_mapping(submitted);
    }
    let submission = result.into_diagnostic()?;

    print_mapping(&submission.mapping);
    Ok(())
}

fn print_mapping(mapping: &BTreeMap<String, String>) {
    for (name, id) in mapping {
        println!("{name}\t{id}");
    }
}

async fn query(scheduler: &PbsScheduler, path: &Utf8Path) -> Result<()> {
    let (store, mut task) = load_task(path)?;

    let result = scheduler.query(&mut task).await;
    save_task(&store, &task)?;
    result.into_diagnostic()?;

    let finished = task
        .valid_jobs()
        .filter(|job| job.running_job.status.is_some_and(|s| s.is_terminal()))
        .count();
    tracing::info!(
        "{} of {} job(s) of task {} finished",
        finished,
        task.valid_jobs().count(),
        task.name
    );

    for job in task.valid_jobs() {
        let running = &job.running_job;
        println!(
            "{}\t{}\t{}\t{}",
            job.name,
            running.status.map(|s| s.to_string()).unwrap_or_default(),
            running.status_scheduler.as_deref().unwrap_or_default(),
            running.destination
        );
    }
    Ok(())
}

async fn kill(scheduler: &PbsScheduler, path: &Utf8Path) -> Result<()> {
    let (_, task) = load_task(path)?;
    scheduler.kill(&task).await.into_diagnostic()?;
    tracing::info!("Killed {} job(s) of task {}", task.valid_jobs().count(), task.name);
    Ok(())
}

fn print_scripts(scheduler: &PbsScheduler, path: &Utf8Path, name: &str) -> Result<()> {
    let (_, task) = load_task(path)?;
    let job = task
        .job(name)
        .ok_or_else(|| miette!("No job named {name} in task {}", task.name))?;

    let scripts = preview(job, &task.stage(), scheduler.config()).into_diagnostic()?;
    print!("{}", scripts.wrapper);
    println!("# --- epilogue ---");
    print!("{}", scripts.epilogue);
    Ok(())
}
