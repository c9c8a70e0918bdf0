//! scnp CLI — user-facing binary for the shared-control daemon.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use scnp_daemon::{load_config, Config, Daemon};
use scnp_input::Controller;
use scnp_protocol::{UdpInterface, UdpLinkBackend};

#[derive(Parser)]
#[command(
    name = "scnp",
    about = "Share one keyboard and mouse across machines on the local segment",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scnp daemon in the foreground.
    Run {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Validate the configuration and print the effective settings.
    CheckConfig {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config.as_deref())?;
            init_tracing(&config.daemon.log_level);
            run(config)
        }
        Commands::CheckConfig { config } => {
            init_tracing("warn");
            let config = load_config(config.as_deref())?;
            link_interfaces(&config)?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn run(config: Config) -> Result<()> {
    let interfaces = link_interfaces(&config)?;
    let backend = Arc::new(UdpLinkBackend::new(interfaces));
    let controller = platform_controller()?;

    tracing::info!(name = %config.identity.name, "starting scnp daemon");
    tokio::runtime::Runtime::new()?.block_on(async {
        let (daemon, _client) = Daemon::new(config, backend, controller).await?;
        daemon.run().await?;
        Ok(())
    })
}

/// The physical capture backend for this build.
///
/// Device capture plugs in behind the [`Controller`] trait per platform; no
/// capture backend is compiled into this binary, so `run` refuses cleanly
/// instead of starting a daemon that can capture nothing.
fn platform_controller() -> Result<Arc<dyn Controller>> {
    bail!("no input capture backend is compiled into this binary")
}

/// Assemble the UDP link backend's interface list from the config.
fn link_interfaces(config: &Config) -> Result<Vec<UdpInterface>> {
    if config.links.is_empty() {
        bail!("no link interfaces configured; add a [[links]] section to the config");
    }
    config
        .links
        .iter()
        .map(|link| {
            Ok(UdpInterface {
                name: link.name.clone(),
                addr: link
                    .addr
                    .parse()
                    .with_context(|| format!("interface {}: bad hardware address", link.name))?,
                bind: link
                    .bind
                    .parse()
                    .with_context(|| format!("interface {}: bad bind address", link.name))?,
                broadcast: link
                    .broadcast
                    .parse()
                    .with_context(|| format!("interface {}: bad broadcast address", link.name))?,
            })
        })
        .collect()
}
