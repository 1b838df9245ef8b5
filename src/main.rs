mod cli;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // stdout carries the plugin protocol.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => cli::serve(args).await?,
        Command::Schema(args) => cli::schema(args).await?,
        Command::Plan(args) => cli::plan(args).await?,
        Command::Import(args) => cli::import(args).await?,
    }

    Ok(())
}
