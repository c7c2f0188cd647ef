// src/cli/handlers/package.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;

use crate::{
    cli::args::PackageArgs,
    core::{package, settings::Settings},
};

/// `charty package <chart> <dest>`: write `<dest>/<name>-<version>.tar.gz`.
pub fn handle(args: Vec<String>, _settings: &Settings) -> Result<()> {
    let package_args = PackageArgs::try_parse_from(&args)?;
    let chart_dir = Path::new(&package_args.chart);

    let archive = package::package(chart_dir, Path::new(&package_args.dest))
        .with_context(|| format!(t!("package.error.failed"), chart = chart_dir.display()))?;

    println!(
        "{} {}",
        t!("common.success").green().bold(),
        format!(t!("package.success"), archive = archive.display())
    );
    Ok(())
}
