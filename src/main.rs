use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use triage::config::{AppConfig, LoggingConfig};
use triage::oracle::agent::AgentOracle;
use triage::platform::github::GitHubPlatform;
use triage::platform::types::Repo;
use triage::triage::dispatcher::DispatcherSettings;
use triage::triage::types::Mode;
use triage::workflow;

#[derive(Parser)]
#[command(name = "triage", version, about = "Find failing CI runs and drive Claude to fix them")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Repository as owner/name
    repo: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List branches whose latest completed run failed
    List {
        /// Branch include pattern (`*` and `?` wildcards); repeatable
        #[arg(long = "branches")]
        branches: Vec<String>,
    },
    /// Explain the failure on a branch without changing anything
    Analyze {
        /// Defaults to the repository's default branch
        branch: Option<String>,
    },
    /// Fix the failure on a branch and open or update a PR
    Triage {
        /// Defaults to the repository's default branch
        branch: Option<String>,
    },
}

fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so the report on stdout stays clean
    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let repo = Repo::parse(&cli.repo)?;
    let config = Arc::new(AppConfig::load(cli.config.as_deref())?);
    init_tracing(&config.logging);

    let platform = GitHubPlatform::new(&config.github)?;

    let report = match cli.command {
        Command::List { branches } => {
            let patterns = if branches.is_empty() {
                config.triage.include_branches.clone()
            } else {
                branches
            };
            tracing::info!(repo = %repo, patterns = ?patterns, "Scanning branches");
            workflow::list_failures(&platform, &repo, &patterns, config.triage.batch_size).await
        }
        Command::Analyze { branch } => {
            run_remediation(&config, &platform, &repo, branch.as_deref(), Mode::Analyze).await?
        }
        Command::Triage { branch } => {
            run_remediation(&config, &platform, &repo, branch.as_deref(), Mode::Triage).await?
        }
    };

    print!("{report}");
    Ok(())
}

async fn run_remediation(
    config: &Arc<AppConfig>,
    platform: &GitHubPlatform,
    repo: &Repo,
    branch: Option<&str>,
    mode: Mode,
) -> anyhow::Result<workflow::types::CommandReport> {
    config.require_claude_key()?;
    if let Some(branch) = branch {
        triage::workspace::git::validate_branch_name(branch)?;
    }

    tracing::info!(repo = %repo, branch = ?branch, mode = ?mode, "Starting remediation");

    let oracle = AgentOracle::new(Arc::clone(config), platform.token());
    let settings = DispatcherSettings::from_config(config);

    Ok(workflow::remediate(platform, &oracle, &settings, repo, branch, mode).await)
}
