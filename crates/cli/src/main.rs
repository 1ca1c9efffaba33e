mod auth_commands;
mod config_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tmibot_supervisor::{Outcome, Supervisor},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tmibot", about = "tmibot - Twitch chat bot", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (TOML, YAML or JSON). Searched for when omitted.
    #[arg(long, global = true, env = "TMIBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default when no subcommand is provided).
    Run,
    /// Acquire a token with the configured grant and report its lifetime.
    Token {
        /// Print the authorization URL instead of opening a browser.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Ask the provider whether a token is still valid.
    Validate {
        /// Access token, with or without the `oauth:` prefix.
        #[arg(long, env = "TMIBOT_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Validate the configuration file and report errors/warnings.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tmibot starting");

    match cli.command {
        None | Some(Commands::Run) => run(cli.config).await,
        Some(Commands::Token { no_browser }) => {
            auth_commands::token(cli.config, no_browser).await
        },
        Some(Commands::Validate { token }) => auth_commands::validate(cli.config, &token).await,
        Some(Commands::Check) => config_commands::check(cli.config),
    }
}

async fn run(config: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, config) = config_commands::load(config)?;
    let supervisor = Supervisor::new(config);

    let cancel = supervisor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping");
            cancel.cancel();
        }
    });

    match supervisor.run().await? {
        Outcome::Stopped => info!("bot stopped by channel owner"),
        Outcome::Cancelled => info!("bot stopped"),
        Outcome::RestartsExhausted => anyhow::bail!("chat session kept failing, giving up"),
    }
    Ok(())
}
