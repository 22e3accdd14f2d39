use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod check;
mod common;
mod diagnose;
mod invoke;
mod logging;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(name = "integration-gateway")]
struct Cli {
    #[command(flatten)]
    common_args: common::CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call one operation and print the JSON result
    Invoke(invoke::InvokeArgs),
    /// Run read-only diagnostics against a provider
    Diagnose(diagnose::DiagnoseArgs),
    /// Validate configuration and list providers
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(&cli.common_args.log_level, cli.common_args.log_format)?;

    let config = cli.common_args.load_config()?;

    match cli.command {
        Commands::Invoke(args) => args.run(&config).await,
        Commands::Diagnose(args) => args.run(&config).await,
        Commands::Check => check::run(&config),
    }
}
