mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gazelog")]
#[command(about = "Gaze dwell-time logging for driving-simulation studies", long_about = None)]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for session commands and record gaze dwell times
    Run {
        /// Command channel port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Folder for session files (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Read `enter <region>` / `exit <region>` lines from stdin
        #[arg(long)]
        gaze_stdin: bool,
    },
    /// Send commands to a running instance
    Send {
        /// Commands to send, e.g. `start`, `pause`, `continue`, `stop`
        #[arg(required = true)]
        commands: Vec<String>,
        /// Host of the running instance
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port of the running instance (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List archived sessions
    History {
        /// Number of sessions to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::logging::init(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run {
            port,
            output_dir,
            gaze_stdin,
        } => commands::run::run_command(port, output_dir, gaze_stdin).await,
        Commands::Send {
            commands: to_send,
            host,
            port,
        } => commands::send::send_command(&to_send, &host, port).await,
        Commands::History { limit, json } => commands::history::history_command(limit, json),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(),
            ConfigAction::Path => commands::config::show_path(),
        },
    }
}
