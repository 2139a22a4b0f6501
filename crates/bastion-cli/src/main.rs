mod cli;
mod commands;
mod logging;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Evaluate(args) => {
            let decision = commands::evaluate::run(args, format).await?;
            if decision.is_deny() {
                std::process::exit(2);
            }
        }
        Commands::Check(args) => {
            let clean = commands::check::run(&args.policies, args.config.as_deref(), format)?;
            if !clean {
                std::process::exit(2);
            }
        }
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show { config } => {
                commands::config::show(config.as_deref())?;
            }
        },
    }

    Ok(())
}
