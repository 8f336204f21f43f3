use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use pairlink_config::PairlinkConfig;

#[derive(Parser)]
#[command(name = "pairlink", about = "Pairlink: two-party pairing and chat relay server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Directory to look for pairlink.{toml,yaml,yml,json} in.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Serve {
        #[arg(long, env = "PAIRLINK_BIND")]
        bind: Option<String>,
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Directory holding index.html, server.html and client.html.
        #[arg(long)]
        public_dir: Option<PathBuf>,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the directory searched for the user config file.
    Path,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Command-line values win over the config file.
fn apply_overrides(
    mut config: PairlinkConfig,
    bind: Option<String>,
    port: Option<u16>,
    public_dir: Option<PathBuf>,
) -> PairlinkConfig {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if public_dir.is_some() {
        config.server.public_dir = public_dir;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = cli.config_dir.clone() {
        pairlink_config::set_config_dir(dir);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "pairlink starting");

    match cli.command {
        Commands::Serve {
            bind,
            port,
            public_dir,
        } => {
            let config =
                apply_overrides(pairlink_config::discover_and_load(), bind, port, public_dir);
            pairlink_gateway::server::start_gateway(&config).await
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = pairlink_config::discover_and_load();
                print!("{}", pairlink_config::to_toml_string(&config)?);
                Ok(())
            },
            ConfigAction::Path => {
                match pairlink_config::config_dir() {
                    Some(dir) => println!("{}", dir.display()),
                    None => eprintln!("no config directory available"),
                }
                Ok(())
            },
        },
    }
}
