//! The PBS backend behind the common scheduler interface.

use crate::config::PbsConfig;
use crate::error::PbsError;
use crate::qstat::{StatusParser, XmlFragmentParser};
use async_trait::async_trait;
use batchlite_core::{BatchScheduler, Submission, Task};
use batchlite_parsers::{CommandRunner, SystemRunner};

/// PBS/Torque scheduler adapter.
///
/// Holds nothing but immutable configuration, so one instance can serve
/// concurrent calls for different tasks.
pub struct PbsScheduler<R = SystemRunner> {
    pub(crate) config: PbsConfig,
    pub(crate) runner: R,
    pub(crate) parser: Box<dyn StatusParser>,
}

impl PbsScheduler<SystemRunner> {
    /// Create an adapter that runs the real PBS tools.
    pub fn new(config: PbsConfig) -> Self {
        let runner = SystemRunner::with_timeout(config.command_timeout);
        Self::with_runner(config, runner)
    }
}

impl<R: CommandRunner> PbsScheduler<R> {
    pub fn with_runner(config: PbsConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            parser: Box::new(XmlFragmentParser),
        }
    }

    /// Replace the qstat output parser.
    pub fn with_parser(mut self, parser: impl StatusParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn config(&self) -> &PbsConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

#[async_trait]
impl<R: CommandRunner> BatchScheduler for PbsScheduler<R> {
    type Error = PbsError;

    fn name(&self) -> &'static str {
        "pbs"
    }

    async fn submit_task(&self, task: &mut Task) -> Result<Submission, PbsError> {
        PbsScheduler::submit_task(self, task).await
    }

    async fn query(&self, task: &mut Task) -> Result<(), PbsError> {
        PbsScheduler::query(self, task).await
    }

    async fn kill(&self, task: &Task) -> Result<(), PbsError> {
        PbsScheduler::kill(self, task).await
    }
}
