// src/cli/handlers/resume.rs

use anyhow::Result;
use clap::Parser;
use std::path::Path;

use super::commons;
use crate::{
    cli::args::ResumeArgs,
    core::{chart::Chart, settings::Settings},
};

/// `charty resume <dir>...` (alias `run`): run directories rendered earlier by
/// `charty template` in place. Nothing is rendered and nothing is removed.
pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let resume_args = ResumeArgs::try_parse_from(&args)?;
    let overrides = commons::runtime_overrides(&resume_args.run)?;
    let runner = commons::build_runner(settings, resume_args.json)?;

    for dir in &resume_args.dirs {
        let mut chart = Chart::new();
        chart
            .load_rendered(Path::new(dir))
            .map_err(|e| commons::load_context(e, dir))?;
        commons::run_chart(&chart, dir, &overrides, &runner, resume_args.json)?;
    }
    Ok(())
}
