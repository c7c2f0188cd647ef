// src/cli/handlers/commons.rs

// Shared steps of the handlers that load and run charts.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use serde_yaml::Mapping;
use std::io::{self, Write};

use crate::{
    cli::args::{RunArgs, ValueArgs},
    core::{
        chart::{Chart, ChartError},
        report::ChartReport,
        runner::TestRunner,
        settings::Settings,
        values::{self, ValueSource},
    },
    models::RuntimeOptions,
    system::executor::ShellExecutor,
};

/// Merges `--values` files and `--set` lists into the template values.
pub fn template_values(args: &ValueArgs) -> Result<Mapping> {
    let sources = ValueSource::from_cli(&args.values, &args.set);
    values::merge_values(&sources).context(t!("values.error.template"))
}

/// Merges `--run-files` and `--run` lists and decodes them into runtime options.
pub fn runtime_overrides(args: &RunArgs) -> Result<RuntimeOptions> {
    let sources = ValueSource::from_cli(&args.run_files, &args.run);
    let merged = values::merge_values(&sources).context(t!("values.error.runtime"))?;
    RuntimeOptions::from_mapping(&merged).context(t!("values.error.runtime_decode"))
}

/// The executor for this invocation. JSON output keeps child output off the console.
pub fn build_runner(settings: &Settings, json: bool) -> Result<TestRunner> {
    let executor: ShellExecutor = settings.executor()?;
    Ok(TestRunner::new(
        executor.with_streaming(settings.stream_output && !json),
    ))
}

/// Wraps a chart so its scratch directory is removed on every exit path.
pub fn guarded_chart() -> scopeguard::ScopeGuard<Chart, impl FnOnce(Chart)> {
    scopeguard::guard(Chart::new(), |mut chart| {
        if let Err(e) = chart.cleanup() {
            log::warn!("{}", e);
        }
    })
}

/// Checks the runtime options the chart would run with before anything executes.
fn validate_options(chart: &Chart, overrides: &RuntimeOptions) -> Result<()> {
    let defaults = RuntimeOptions::from_mapping(chart.runtime_defaults())
        .with_context(|| format!(t!("run.error.decode"), chart = chart.name()))?;
    defaults
        .merged_with(overrides)
        .validate()
        .with_context(|| format!(t!("run.error.invalid"), chart = chart.name()))
}

/// Runs a loaded chart and prints its report. Fails when any step failed.
pub fn run_chart(
    chart: &Chart,
    source: &str,
    overrides: &RuntimeOptions,
    runner: &TestRunner,
    json: bool,
) -> Result<()> {
    validate_options(chart, overrides)?;

    if !json {
        println!(
            "\n{}",
            format!(
                t!("run.info.starting"),
                chart = chart.name(),
                version = chart.version(),
                source = source
            )
            .bold()
        );
    }

    let outcome = runner.run(chart, overrides)?;
    let report = ChartReport {
        chart: chart.name(),
        version: chart.version(),
        source,
        results: &outcome.results,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        report.write_json(&mut out)?;
    } else {
        report.write_human(&mut out)?;
    }
    out.flush()?;

    if outcome.succeeded() {
        Ok(())
    } else {
        Err(anyhow!(
            t!("run.error.failed"),
            chart = chart.name(),
            errors = outcome.errors
        ))
    }
}

/// Adds the chart reference to a load error.
pub fn load_context(error: ChartError, chart_ref: &str) -> anyhow::Error {
    anyhow::Error::new(error).context(format!(t!("chart.error.load"), chart = chart_ref))
}
