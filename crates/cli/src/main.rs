//! tightfit CLI: the main entry point.
//!
//! Commands:
//! - `compress`: Compress one file to fit the configured limit
//! - `serve`: Start the HTTP gateway with the webhook bot
//! - `chat`: Talk to the bot from the terminal
//! - `doctor`: Diagnose the local setup
//! - `config`: Print, locate or validate configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tightfit",
    about = "tightfit - compress documents and images to fit under a byte limit",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a single file
    Compress {
        /// File to compress
        input: PathBuf,

        /// Where to write the result (defaults to `<stem>_compressed.<ext>` next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Declared media type (guessed from the extension when omitted)
        #[arg(short, long)]
        mime: Option<String>,
    },

    /// Start the HTTP gateway and webhook bot
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the compression bot in the terminal
    Chat {
        /// Directory for compressed replies
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Diagnose system health
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML
    Default,
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compress {
            input,
            output,
            mime,
        } => commands::compress::run(input, output, mime).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { output_dir } => commands::chat::run(output_dir).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Default => commands::config_cmd::print_default(),
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
