// src/cli/handlers/start.rs

use anyhow::Result;
use clap::Parser;

use super::commons;
use crate::{
    cli::args::StartArgs,
    core::{renderer::TemplateEngine, settings::Settings},
};

/// `charty start <chart>...`: load each chart, run it, report, clean up.
/// Stops at the first chart that fails to load or run.
pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let start_args = StartArgs::try_parse_from(&args)?;

    // Every override is resolved before any chart is touched.
    let values = commons::template_values(&start_args.values)?;
    let overrides = commons::runtime_overrides(&start_args.run)?;
    let runner = commons::build_runner(settings, start_args.json)?;

    for chart_ref in &start_args.charts {
        let mut chart = commons::guarded_chart();
        chart
            .load(chart_ref, &values, &TemplateEngine, &settings.scratch_dir)
            .map_err(|e| commons::load_context(e, chart_ref))?;
        commons::run_chart(&chart, chart_ref, &overrides, &runner, start_args.json)?;
    }
    Ok(())
}
