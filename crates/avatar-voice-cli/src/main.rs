use std::sync::Arc;

use clap::{Parser, Subcommand};

use avatar_voice_core::config::Config;

mod logging;
mod speak;

#[derive(Parser)]
#[command(
    name = "avatar-voice",
    about = "Streaming text-to-speech for avatars: queue text, buffer audio ahead, play in order",
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
    /// Speak text through the TTS pipeline (reads stdin lines when no TEXT is given)
    Speak {
        /// Utterances to speak, in order
        text: Vec<String>,

        /// TTS server base URL (default: tts.endpoint)
        #[arg(long)]
        endpoint: Option<String>,

        /// Clips to buffer ahead of playback (default: pipeline.target_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Split input into sentences instead of one utterance per line
        #[arg(long)]
        sentences: bool,
    },

    /// Start the TTS gateway server
    Serve {
        /// Port to listen on (default: 5000)
        #[arg(long)]
        port: Option<u16>,
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
    /// Get a specific config value
    Get { key: String },
    /// Set a config value (parsed as JSON, else stored as a string)
    Set { key: String, value: String },
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let config = Config::load(&config_path)?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Speak {
            text,
            endpoint,
            depth,
            sentences,
        } => {
            speak::run(
                &config,
                speak::SpeakArgs {
                    texts: text,
                    endpoint,
                    depth,
                    sentences,
                },
            )
            .await?;
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            tracing::info!("Starting Avatar Voice gateway on port {port}");

            let state = avatar_voice_gateway::GatewayState::new(Arc::new(config))?;
            #[cfg(feature = "metrics")]
            let state = {
                let recorder = avatar_voice_gateway::metrics::install_prometheus_recorder()?;
                state.with_metrics(recorder)
            };

            avatar_voice_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("Key not found: {key}"),
            },
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str(&value)
                    .unwrap_or(serde_json::Value::String(value));
                let mut config = config;
                config.set_path(&key, value)?;
                config.save(&config_path)?;
                println!("Set {key} in {}", config_path.display());
            }
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for w in &warnings {
                    println!("warning: {w}");
                }
                for e in &errors {
                    println!("error: {e}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK: {}", config_path.display());
            }
        },
    }

    Ok(())
}
