//! Agent Modules service - main entry point

use agent_modules::api::shutdown_signal;
use agent_modules::config::{ServiceConfig, DEFAULT_CONFIG_PATHS};
use agent_modules::observability::init_default_logging;
use agent_modules::Service;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};

/// Multi-tenant agent module dispatch service
#[derive(Parser)]
#[command(name = "agent-modules")]
#[command(about = "HTTP service dispatching NLP and tabular agent modules")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AGENT_MODULES_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Run,
    /// Validate configuration
    Config {
        /// Print the effective configuration as TOML
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!(
        "Starting agent-modules v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_service(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&Path>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ServiceConfig::load_from_file(path)?)
        }
        None => {
            for path_str in DEFAULT_CONFIG_PATHS {
                let path = Path::new(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ServiceConfig::load_from_file(path)?);
                }
            }

            warn!("No configuration file found, using built-in defaults");
            let config = ServiceConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn run_service(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = Service::from_config(config)?;
    info!(
        address = %service.listen_addr()?,
        "Service is running"
    );
    service.run(shutdown_signal()).await?;
    Ok(())
}

fn handle_config_command(
    config: &ServiceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Effective configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    config.validate()?;
    println!("Configuration is valid");
    Ok(())
}
