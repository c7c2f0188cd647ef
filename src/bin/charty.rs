// src/bin/charty.rs

use anyhow::Result;
use charty::{
    cli::{Cli, dispatcher},
    core::settings::Settings,
};
use clap::Parser;
use colored::*;

/// Sets up logging, loads settings once, dispatches, and owns the exit code.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // Argument errors of a subcommand (including `--help`) are printed by clap itself.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let settings = Settings::load()?;
    log::debug!("Effective settings: {:?}", settings);

    dispatcher::dispatch(cli.args, &settings)
}
