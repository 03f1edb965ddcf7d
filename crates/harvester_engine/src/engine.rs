use std::path::Path;

use engine_logging::engine_debug;

use crate::clock::SystemClock;
use crate::config::HarvestConfig;
use crate::jobs::{Harvester, PipelineSummary};
use crate::progress::ProgressSink;
use crate::transport::ReqwestTransport;
use crate::{HarvestError, JobSummary};

/// Blocking front end: owns a single-threaded runtime and runs one job at a time on it.
pub struct EngineHandle {
    runtime: tokio::runtime::Runtime,
    harvester: Harvester,
}

impl EngineHandle {
    pub fn new(
        config: HarvestConfig,
        progress: Box<dyn ProgressSink>,
    ) -> Result<Self, HarvestError> {
        if config.transport.token.trim().is_empty() {
            return Err(HarvestError::MissingToken);
        }
        engine_debug!("Starting engine with {:?}", config.transport);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let transport = ReqwestTransport::new(config.transport.clone())?;
        let harvester = Harvester::new(
            config,
            Box::new(transport),
            Box::new(SystemClock),
            progress,
        );
        Ok(Self { runtime, harvester })
    }

    pub fn discover(&self, destination: &Path) -> Result<JobSummary, HarvestError> {
        self.runtime.block_on(self.harvester.discover(destination))
    }

    pub fn harvest_pull_requests(
        &self,
        repositories: &Path,
        destination: &Path,
    ) -> Result<JobSummary, HarvestError> {
        self.runtime
            .block_on(self.harvester.harvest_pull_requests(repositories, destination))
    }

    pub fn annotate_states(
        &self,
        input: &Path,
        destination: &Path,
    ) -> Result<JobSummary, HarvestError> {
        self.runtime
            .block_on(self.harvester.annotate_states(input, destination))
    }

    pub fn run(&self, repositories: &Path, pulls: &Path) -> Result<PipelineSummary, HarvestError> {
        self.runtime.block_on(self.harvester.run(repositories, pulls))
    }
}
