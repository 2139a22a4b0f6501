use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bastion")]
#[command(about = "Bastion - evaluate and check attribute-based access policies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, env = "BASTION_LOG", default_value = "warn")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a request against a policy file
    Evaluate(EvaluateArgs),
    /// Parse a policy file and report problems
    Check(CheckArgs),
    /// Inspect engine configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct EvaluateArgs {
    /// Policy document (a single policy or a JSON array of policies)
    #[arg(short, long)]
    pub policies: PathBuf,
    /// Evaluation request JSON (reads from stdin if omitted)
    #[arg(short, long)]
    pub request: Option<PathBuf>,
    /// Subject, resource and action attribute tables
    #[arg(short, long)]
    pub attributes: Option<PathBuf>,
    /// Engine configuration (TOML)
    #[arg(short, long, env = "BASTION_CONFIG")]
    pub config: Option<PathBuf>,
    /// Show how every statement fared
    #[arg(long)]
    pub trace: bool,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Policy document to check
    #[arg(short, long)]
    pub policies: PathBuf,
    /// Engine configuration (TOML), for the nesting limit
    #[arg(short, long, env = "BASTION_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show {
        /// Configuration file; defaults apply when omitted
        #[arg(short, long, env = "BASTION_CONFIG")]
        config: Option<PathBuf>,
    },
}
