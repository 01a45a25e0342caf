//! `nimbus` -- validate, load, run and schedule TypeScript functions.

#![forbid(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use nimbus_config::Settings;

mod cli;
mod commands;
mod host;
mod schedules;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log = nimbus_log::init_from_env().context("failed to initialise logging")?;

    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    settings.validate().context("invalid settings")?;

    match cli.command {
        Command::Validate(args) => commands::validate(&settings, &args).await,
        Command::Hash(args) => commands::hash(&args).await,
        Command::Load(args) => commands::load(&settings, &args).await,
        Command::Run(args) => commands::run(&settings, &args).await,
        Command::Serve(args) => commands::serve(&settings, &args).await,
    }
}
