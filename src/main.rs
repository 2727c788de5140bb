//! pc-control - Main Entry Point
//!
//! ```text
//! pc-control [--hide] [-c FILE] [--show-config] <broker> <username> <password> [port] [device_name]
//! ```

use clap::Parser;
use pc_control::actions::SystemActions;
use pc_control::agent::{AgentContext, AgentLifecycle};
use pc_control::config::{AgentConfig, ConfigOverrides};
use pc_control::error::AgentResult;
use pc_control::observability::init_default_logging;
use pc_control::protocol::{system_hostname, AGENT_VERSION};
use pc_control::session::spawn_signal_listener;
use pc_control::transport::mqtt::MqttClient;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

/// Announce this PC on an MQTT broker and accept remote sleep / monitor-off commands
#[derive(Parser)]
#[command(name = "pc-control")]
#[command(version)]
struct Cli {
    /// Only print errors to the console
    #[arg(long)]
    hide: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration (password redacted) and exit
    #[arg(long)]
    show_config: bool,

    /// Broker host or mqtt://host[:port] URL
    broker: Option<String>,

    /// Broker username
    username: Option<String>,

    /// Broker password
    #[arg(env = "PC_CONTROL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Broker port [default: 1883]
    port: Option<u16>,

    /// Device name used in topics [default: host name]
    device_name: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            broker: self.broker.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            device_name: self.device_name.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.hide);

    if !cli.hide {
        info!("Starting pc-control v{}", AGENT_VERSION);
    }

    if let Err(e) = run(cli).await {
        error!("Startup failed: {}", e);
        process::exit(e.exit_code());
    }

    info!("Application shutdown complete");
}

fn load_configuration(cli: &Cli) -> AgentResult<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            AgentConfig::load_from_file(path)?
        }
        None => AgentConfig::default(),
    };
    config.apply_overrides(cli.overrides());
    Ok(config)
}

async fn run(cli: Cli) -> AgentResult<()> {
    let config = load_configuration(&cli)?;

    if cli.show_config {
        println!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    config.validate()?;

    let context = AgentContext::from_config(&config, system_hostname)?;
    let action_log = context.action_log();
    if let Some(path) = action_log.path() {
        info!("Action log: {}", path.display());
    }

    let mut agent = AgentLifecycle::new(
        context,
        MqttClient::new(),
        Arc::new(SystemActions::new()),
        action_log,
    );

    let _signal_listener = spawn_signal_listener(agent.run_flag())?;

    let report = agent.run().await;
    info!(
        offline_published = report.offline_published,
        disconnected = report.disconnected,
        "Agent stopped"
    );
    Ok(())
}
