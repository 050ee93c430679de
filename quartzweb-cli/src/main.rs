//! QuartzWeb CLI: runs an embedded server on a device.
//!
//! ```bash
//! quartzweb init
//! quartzweb serve --port 8080
//! ```
//!
//! See `quartzweb --help` for all available commands and options.

mod commands;
mod demo;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quartzweb",
    about = "Embeddable HTTP/WebSocket server",
    version,
    after_help = "Configuration is read from quartzweb.toml, then QW_* environment variables."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server with the demo handlers
    Serve {
        /// Configuration file
        #[arg(short, long, default_value = quartzweb_core::config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Override the listening address
        #[arg(long)]
        host: Option<String>,

        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the upload temp directory
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Write a configuration file holding the defaults
    Init {
        /// Destination file
        #[arg(default_value = quartzweb_core::config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, host, port, temp_dir } => {
            let overrides = commands::serve::Overrides { host, port, temp_dir };
            commands::serve::run(&config, overrides)
        }
        Commands::Init { path, force } => commands::init::run(&path, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
