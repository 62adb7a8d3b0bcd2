mod cli;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use llamaembed::config::AppConfig;

#[derive(Parser)]
#[command(name = "llamaembed", version, about = "Embed text with a llama.cpp server")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Command-line overrides applied on top of the config file.
#[derive(Args)]
struct Overrides {
    /// Config file (default: ~/.llamaembed/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// llama.cpp server URL
    #[arg(long, global = true)]
    host: Option<String>,

    /// Model name sent with each request
    #[arg(long, global = true)]
    model: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Send texts without the code-search query prefix
    #[arg(long, global = true)]
    no_code_prefix: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Embed a single text and print the vector as JSON
    Embed {
        text: String,
    },
    /// Embed one text per line from a file (or stdin) in a single request
    Batch {
        file: Option<PathBuf>,
    },
    /// Ask the server for the model's output dimension
    Detect {
        #[arg(long, default_value = llamaembed::embedding::llamacpp::DETECTION_TEXT)]
        text: String,
    },
    /// Show the effective configuration and check the server is reachable
    Doctor,
    /// Print the effective configuration as TOML
    Config,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.embedding.host = Some(host.clone());
        }
        if let Some(model) = &self.model {
            config.embedding.model = Some(model.clone());
        }
        if let Some(timeout) = self.timeout {
            config.embedding.timeout = Some(timeout);
        }
        if self.no_code_prefix {
            config.embedding.code_prefix = Some(false);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.overrides.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    cli.overrides.apply(&mut config);

    // Log to stderr so stdout stays clean for JSON output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Embed { text } => cli::embed::embed(&config, &text).await?,
        Command::Batch { file } => cli::embed::batch(&config, file.as_deref()).await?,
        Command::Detect { text } => cli::embed::detect(&config, &text).await?,
        Command::Doctor => cli::doctor::doctor(&config).await?,
        Command::Config => cli::print_config(&config)?,
    }

    Ok(())
}
