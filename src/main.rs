use clap::{Parser, Subcommand};
use logstitch::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logstitch")]
#[command(about = "Postgres log stream assembly agent", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the configured servers' logs and submit assembled artifacts
    Run,
    /// Assemble a log file in one pass and print the result
    Replay {
        file: PathBuf,
        /// Known log_line_prefix; detected per line when omitted
        #[arg(long)]
        prefix: Option<String>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
        /// Write here instead of ~/.config/logstitch/config.yml
        #[arg(long)]
        path: Option<PathBuf>,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logstitch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            logstitch::cli::run::run(config_path).await?;
        }
        Some(Commands::Replay { file, prefix }) => {
            logstitch::cli::replay::replay(&file, prefix.as_deref())?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout, path } => {
                logstitch::cli::config::init(stdout, path)?;
            }
            ConfigAction::Validate => {
                logstitch::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
