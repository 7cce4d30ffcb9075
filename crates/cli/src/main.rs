use clap::{Parser, Subcommand};
use herald::relay::Outcome;
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Webex broadcast relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: HERALD_CONFIG_PATH or ~/.herald/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the gateway: health check on `/`, Webex webhook deliveries on the configured path.
    Gateway {
        /// Config file path (default: HERALD_CONFIG_PATH or ~/.herald/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Process one webhook event without starting a server.
    Handle {
        /// Config file path (default: HERALD_CONFIG_PATH or ~/.herald/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Event JSON file, or `-` for stdin.
        #[arg(long, short, value_name = "FILE")]
        event: PathBuf,

        /// X-Spark-Signature value to verify the event body against.
        #[arg(long, short, value_name = "HEX")]
        signature: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("herald {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Handle {
            config,
            event,
            signature,
        }) => {
            if let Err(e) = run_handle(config, &event, signature.as_deref()).await {
                log::error!("handle failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(herald::config::default_config_path);
    let dir = herald::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = herald::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::debug!("using config {}", path.display());
    let settings = herald::config::Settings::resolve(&config)?;
    log::info!("starting gateway on {}:{}", settings.bind, settings.port);
    herald::gateway::run_gateway(settings).await
}

async fn run_handle(
    config_path: Option<PathBuf>,
    event: &Path,
    signature: Option<&str>,
) -> anyhow::Result<()> {
    let (config, _) = herald::config::load_config(config_path)?;
    let settings = herald::config::Settings::resolve(&config)?;
    let body = read_event(event)?;
    let relay = herald::gateway::build_relay(&settings)?;
    let outcome = herald::gateway::handle_one(&relay, &settings, &body, signature).await?;
    println!("{}", summarize(outcome.as_ref()));
    Ok(())
}

fn read_event(source: &Path) -> anyhow::Result<Vec<u8>> {
    use anyhow::Context;

    if source == Path::new("-") {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("reading event from stdin")?;
        Ok(body)
    } else {
        std::fs::read(source).with_context(|| format!("reading event from {}", source.display()))
    }
}

/// One-line JSON summary of how the event was handled.
fn summarize(outcome: Option<&Outcome>) -> serde_json::Value {
    match outcome {
        None => json!({ "outcome": "deadline" }),
        Some(Outcome::Ignored(reason)) => json!({ "outcome": "ignored", "reason": reason.to_string() }),
        Some(Outcome::MembershipNotified) => json!({ "outcome": "membership" }),
        Some(Outcome::Answered(command)) => json!({ "outcome": "answered", "command": command }),
        Some(Outcome::Declined(reply)) => json!({ "outcome": "declined", "reply": reply }),
        Some(Outcome::Failed(err)) => json!({ "outcome": "failed", "error": err.to_string() }),
        Some(Outcome::Broadcast(report)) => json!({
            "outcome": "broadcast",
            "successes": report.successes().len(),
            "failures": report.failures().len(),
            "total": report.total(),
        }),
    }
}
