use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use giftgen_core::config::{Config, LoggingConfig};
use giftgen_gateway::GatewayState;
use giftgen_jobs::Orchestrator;
use giftgen_providers::VendorSet;
use giftgen_tools::{ToolContext, ToolRegistry, register_builtin_tools};

#[derive(Parser)]
#[command(
    name = "giftgen",
    about = "Personalized birthday song and avatar video generation service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show vendor configuration status
    Status,

    /// Generate one track from the command line
    Music {
        /// Description of the music to generate
        #[arg(short, long)]
        prompt: String,

        /// Length in seconds (clamped to 10..=120)
        #[arg(short, long)]
        duration: Option<i64>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Later files do not override values already set.
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    init_logging(config.logging.as_ref(), cli.verbose);

    let (warnings, errors) = config.validate();
    for warning in &warnings {
        tracing::warn!("{warning}");
    }
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("{error}");
        }
        anyhow::bail!("invalid configuration in {}", config_path.display());
    }

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            let config = Arc::new(config);
            let vendors = VendorSet::from_config(&config);
            let state = GatewayState::new(config.clone(), &vendors);

            #[cfg(feature = "metrics")]
            let state = match giftgen_gateway::metrics::install_prometheus_recorder() {
                Ok(handle) => state.with_prometheus(handle),
                Err(e) => {
                    tracing::warn!(%e, "Failed to install Prometheus recorder");
                    state
                }
            };

            tracing::info!(
                music_dir = %config.music_dir().display(),
                video_dir = %config.video_dir().display(),
                "Starting GiftGen gateway on port {port}"
            );
            giftgen_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Status => {
            let vendors = VendorSet::from_config(&config);
            let state = GatewayState::new(Arc::new(config.clone()), &vendors);
            let descriptor = state.descriptor();
            println!("{} v{}", descriptor.service, descriptor.version);
            println!("Config: {}", config_path.display());
            println!("Music dir: {}", config.music_dir().display());
            println!("Video dir: {}", config.video_dir().display());
            println!("ElevenLabs configured: {}", descriptor.elevenlabs_configured);
            println!("OpenAI configured: {}", descriptor.openai_configured);
            println!("fal configured: {}", descriptor.fal_configured);
            for warning in &warnings {
                println!("warning: {warning}");
            }
        }
        Commands::Music { prompt, duration } => {
            let vendors = VendorSet::from_config(&config);
            let orchestrator = Arc::new(Orchestrator::new(&config, &vendors));
            let mut registry = ToolRegistry::new();
            register_builtin_tools(&mut registry, orchestrator);

            let mut params = json!({ "prompt": prompt });
            if let Some(duration) = duration {
                params["duration_seconds"] = json!(duration);
            }
            let output = registry
                .execute("generate_music", params, &ToolContext::default())
                .await?;
            println!("{}", output.content);
            if output.is_error {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
        },
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the configured level and per-target filters,
/// falling back to `debug` with `--verbose` and `info` without.
fn log_filter(logging: Option<&LoggingConfig>, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let default_level = if verbose { "debug" } else { "info" };
    let level = logging
        .and_then(|l| l.level.as_deref())
        .unwrap_or(default_level);
    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }

    EnvFilter::try_new(directives.join(",")).unwrap_or_else(|e| {
        eprintln!("invalid log filter ({e}), using {default_level}");
        EnvFilter::new(default_level)
    })
}

fn init_logging(logging: Option<&LoggingConfig>, verbose: bool) {
    let json = logging.is_some_and(|l| l.format == "json");
    let stdout = logging.is_some_and(|l| l.output == "stdout");
    let builder = tracing_subscriber::fmt().with_env_filter(log_filter(logging, verbose));

    match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).init(),
        (true, false) => builder.json().with_writer(std::io::stderr).init(),
        (false, true) => builder.with_writer(std::io::stdout).init(),
        (false, false) => builder.with_writer(std::io::stderr).init(),
    }
}
