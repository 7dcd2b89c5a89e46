use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "anv-cli")]
#[command(about = "Terminal viewer for document-anonymization result sets")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[arg(long, global = true)]
    pub config_dir: Option<String>,

    #[arg(long, global = true, env = "ANV_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Open the result view for a processed task
    View {
        /// Task identifier of the processed document
        task_id: String,
        /// Start on the per-page tab at this page number
        #[arg(long)]
        page: Option<u32>,
        /// Print a one-shot rendering instead of the interactive viewer
        #[arg(long)]
        no_interactive: bool,
        /// Download the mapping artifact to this path and exit
        #[arg(long)]
        download: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Store a session token for the active profile
    Login,
    /// Clear the stored session token
    Logout,
    /// Show authentication status
    Status,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (api_url, user_id, timeout_seconds, page_size, default_profile)
        key: String,
        /// Configuration value
        value: String,
    },
}
