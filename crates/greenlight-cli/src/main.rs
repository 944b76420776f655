use std::path::Path;

use clap::{Parser, Subcommand};

use greenlight_core::OrchestratorConfig;

mod certstore;
mod commands;
mod hooks;
mod sink;

#[derive(Parser)]
#[command(
    name = "greenlight",
    about = "Greenlight — blue-green deployment switch orchestrator",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to the orchestrator configuration file
    #[arg(short, long, default_value = "greenlight.toml", global = true)]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show team environment state
    Show {
        /// Restrict output to one team
        team: Option<String>,
    },
    /// Switch a team to the target environment
    Switch {
        team: String,
        /// Target environment: blue or green
        environment: String,
        /// Reason recorded with the switch
        #[arg(short, long, default_value = "operator requested")]
        reason: String,
    },
    /// Check a team's configuration completeness
    Validate { team: String },
    /// Print the rendered routing configuration
    Routing,
    /// Watch post-switch health for all teams and roll back on breach
    Monitor,
    /// Certificate bundle operations
    Certs {
        #[command(subcommand)]
        action: CertsAction,
    },
}

#[derive(Subcommand)]
enum CertsAction {
    /// Print the certificate descriptor for current team membership
    Plan,
    /// Rotate the shared bundle to cover current team membership
    Rotate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("greenlight=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::from_file(Path::new(&cli.config))?;

    match cli.command {
        Commands::Show { team } => commands::show::run(&config, team.as_deref()),
        Commands::Switch {
            team,
            environment,
            reason,
        } => commands::switch::run(&config, &team, &environment, &reason).await,
        Commands::Validate { team } => commands::validate::run(&config, &team),
        Commands::Routing => commands::routing::run(&config),
        Commands::Monitor => commands::monitor::run(&config).await,
        Commands::Certs { action } => match action {
            CertsAction::Plan => commands::certs::plan(&config),
            CertsAction::Rotate => commands::certs::rotate(&config),
        },
    }
}
