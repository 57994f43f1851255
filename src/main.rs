mod cli;
mod config;
mod error;
mod history;
mod output;
mod report;
mod runner;
mod workflow;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cirun - Local CI Workflow Runner");
    cli.execute().await
}
