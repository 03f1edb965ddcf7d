use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_REPOSITORIES: &str = "github_repositories.csv";
pub const DEFAULT_PULLS: &str = "github_pr_dataset.csv";
pub const DEFAULT_STATES: &str = "github_pr_dataset_state.csv";

#[derive(Debug, Parser)]
#[command(name = "harvester")]
#[command(
    author,
    version,
    about = "Resumable harvesting of GitHub repositories and pull requests into CSV datasets"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// RON file with harvesting settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// GraphQL endpoint (overrides config)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Where log output goes
    #[arg(long, value_enum, default_value = "terminal", global = true)]
    pub log_to: LogTarget,

    /// Log file used by `--log-to file|both`
    #[arg(long, default_value = "harvester.log", global = true)]
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect the ranked repository list
    Discover {
        /// Destination repository list
        #[arg(default_value = DEFAULT_REPOSITORIES)]
        repositories: PathBuf,

        /// Search query used for the ranking (overrides config)
        #[arg(long)]
        query: Option<String>,

        /// Stop after this many repositories (overrides config)
        #[arg(long, conflicts_with = "no_cap")]
        cap: Option<usize>,

        /// Walk the whole ranking
        #[arg(long)]
        no_cap: bool,
    },

    /// Collect reviewed pull requests of every repository not yet collected
    Pulls {
        /// Repository list carrying the `pr_collected` flags
        #[arg(long, default_value = DEFAULT_REPOSITORIES)]
        repositories: PathBuf,

        /// Destination pull request dataset
        #[arg(default_value = DEFAULT_PULLS)]
        pulls: PathBuf,
    },

    /// Annotate each pull request row with its current state
    States {
        /// Pull request dataset to annotate
        #[arg(long, default_value = DEFAULT_PULLS)]
        input: PathBuf,

        /// Destination state dataset
        #[arg(default_value = DEFAULT_STATES)]
        output: PathBuf,
    },

    /// Rebuild `pr_collected` flags from the pull request dataset
    Reconcile {
        #[arg(long, default_value = DEFAULT_REPOSITORIES)]
        repositories: PathBuf,

        #[arg(long, default_value = DEFAULT_PULLS)]
        pulls: PathBuf,
    },

    /// Discover when the repository list is missing, then collect pull requests
    Run {
        #[arg(long, default_value = DEFAULT_REPOSITORIES)]
        repositories: PathBuf,

        #[arg(long, default_value = DEFAULT_PULLS)]
        pulls: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn pulls_uses_default_paths() {
        let cli = Cli::try_parse_from(["harvester", "pulls", "--token", "abc"]).unwrap();
        assert_eq!(cli.global.token.as_deref(), Some("abc"));
        match cli.command {
            Command::Pulls {
                repositories,
                pulls,
            } => {
                assert_eq!(repositories, PathBuf::from(DEFAULT_REPOSITORIES));
                assert_eq!(pulls, PathBuf::from(DEFAULT_PULLS));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbosity_is_counted() {
        let cli = Cli::try_parse_from(["harvester", "-vv", "reconcile"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert!(matches!(cli.command, Command::Reconcile { .. }));
    }

    #[test]
    fn cap_and_no_cap_conflict() {
        let result = Cli::try_parse_from(["harvester", "discover", "--cap", "5", "--no-cap"]);
        assert!(result.is_err());
    }
}
