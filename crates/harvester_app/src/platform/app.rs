use anyhow::{Context, Result};
use clap::Parser;
use engine_logging::{engine_info, level_for_verbosity};
use harvester_engine::{EngineHandle, HarvestError, JobSummary, LogProgressSink};

use super::{config, logging};
use crate::cli::{Cli, Command};

pub fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(
        cli.global.log_to,
        level_for_verbosity(cli.global.verbose),
        &cli.global.log_file,
    );

    match &cli.command {
        Command::Reconcile {
            repositories,
            pulls,
        } => {
            let flagged = harvester_engine::reconcile_flags(repositories, pulls)
                .with_context(|| format!("Failed to reconcile {}", repositories.display()))?;
            println!("reconcile: {flagged} repositories flagged as collected");
        }
        Command::Discover { repositories, .. } => {
            let summary = start_engine(&cli)?
                .discover(repositories)
                .context("Repository discovery failed")?;
            report("discover", &summary);
        }
        Command::Pulls {
            repositories,
            pulls,
        } => {
            let summary = start_engine(&cli)?
                .harvest_pull_requests(repositories, pulls)
                .context("Pull request harvest failed")?;
            report("pulls", &summary);
        }
        Command::States { input, output } => {
            let summary = start_engine(&cli)?
                .annotate_states(input, output)
                .context("State annotation failed")?;
            report("states", &summary);
        }
        Command::Run {
            repositories,
            pulls,
        } => {
            let summary = start_engine(&cli)?
                .run(repositories, pulls)
                .context("Harvest pipeline failed")?;
            if let Some(discovery) = &summary.discovery {
                report("discover", discovery);
            }
            report("pulls", &summary.pulls);
        }
    }
    Ok(())
}

fn start_engine(cli: &Cli) -> Result<EngineHandle> {
    let config = config::resolve(&cli.global, &cli.command)?;
    match EngineHandle::new(config, Box::new(LogProgressSink)) {
        Ok(engine) => Ok(engine),
        Err(HarvestError::MissingToken) => {
            anyhow::bail!("A GitHub token is required: pass --token or set GITHUB_TOKEN")
        }
        Err(err) => Err(err).context("Failed to start the harvesting engine"),
    }
}

fn report(job: &str, summary: &JobSummary) {
    engine_info!("{job} finished: {summary:?}");
    println!(
        "{job}: {} processed, {} skipped, {} failed, {} records written",
        summary.processed, summary.skipped, summary.failed, summary.records_written
    );
}
