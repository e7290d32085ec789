//! BMS listener - main entry point
//!
//! Loads `.env`, initialises logging, resolves the configuration, generates
//! the client identifier and hands over to the controller.

use bms_listener::config::ClientConfig;
use bms_listener::controller::{MqttController, SessionOutcome};
use bms_listener::error::{ClientError, ClientResult};
use bms_listener::id_generator::DEFAULT_SUFFIX_LENGTH;
use bms_listener::observability::init_default_logging;
use bms_listener::transport::MqttError;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info, warn};

/// MQTT listener for BMS telemetry
#[derive(Parser)]
#[command(name = "bms-listener")]
#[command(about = "Subscribe to an MQTT topic and log every message received")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables are used otherwise)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Environment file to load before reading variables
    #[arg(long, value_name = "FILE", default_value = ".env")]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log received messages until interrupted
    Run,
    /// Validate the configuration
    Config {
        /// Print the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Before logging, so LOG_LEVEL and friends may come from the file
    let env_loaded = dotenv::from_path(&cli.env_file);

    init_default_logging();

    info!("Starting BMS listener v{}", env!("CARGO_PKG_VERSION"));
    match env_loaded {
        Ok(()) => debug!("Loaded environment from {}", cli.env_file.display()),
        Err(e) => debug!("No environment file loaded from {}: {}", cli.env_file.display(), e),
    }

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_listener(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(config_path: Option<&Path>) -> ClientResult<ClientConfig> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ClientConfig::load_from_file(path)?)
        }
        None => Ok(ClientConfig::from_env()),
    }
}

async fn run_listener(config: ClientConfig) -> ClientResult<()> {
    let config = config.with_generated_client_id(DEFAULT_SUFFIX_LENGTH)?;
    info!("Using client ID: {}", config.client_id);

    let controller = MqttController::new(config);
    match controller.connect().await {
        SessionOutcome::Interrupted => Ok(()),
        SessionOutcome::ConnectionClosed => {
            warn!("Connection closed and not re-established");
            Ok(())
        }
        SessionOutcome::InvalidConfig(e) => Err(ClientError::Config(e)),
        SessionOutcome::TransportFailed(reason) => Err(MqttError::Transport(reason).into()),
    }
}

fn handle_config_command(config: ClientConfig, show: bool) -> ClientResult<()> {
    config.validate()?;

    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    info!("Configuration validation complete");
    Ok(())
}
