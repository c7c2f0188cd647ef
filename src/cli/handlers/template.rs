// src/cli/handlers/template.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;

use super::commons;
use crate::{
    cli::args::TemplateArgs,
    core::{renderer::TemplateEngine, settings::Settings},
};

/// `charty template <chart> <dest>`: render a chart without running it.
pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let template_args = TemplateArgs::try_parse_from(&args)?;
    let values = commons::template_values(&template_args.values)?;

    let mut chart = commons::guarded_chart();
    chart
        .load(
            &template_args.chart,
            &values,
            &TemplateEngine,
            &settings.scratch_dir,
        )
        .map_err(|e| commons::load_context(e, &template_args.chart))?;

    let dest = Path::new(&template_args.dest);
    chart
        .export(dest)
        .with_context(|| format!(t!("template.error.export"), dest = dest.display()))?;

    println!(
        "{} {}",
        t!("common.success").green().bold(),
        format!(
            t!("template.success"),
            chart = chart.name(),
            dest = dest.display()
        )
    );
    Ok(())
}
