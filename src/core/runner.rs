//! # Command Runner
//!
//! Executes the runtime options of a loaded chart inside its execution directory:
//!
//! ```text
//! GLOBAL_PRE ──ok──> COMMANDS ──> GLOBAL_POST ──ok──> DONE
//!     │                               │
//!     └─fail─> DONE (halted)          └─fail─> DONE (halted)
//! ```
//!
//! A failing global hook stops the pipeline and is reported as a synthetic
//! `global-pre-run` / `global-post-run` record. Failures of individual commands are
//! recorded on their [`CommandOutput`] and in the aggregate [`MultiError`], but never
//! stop the remaining commands.

use crate::constants::{GLOBAL_POST_RUN, GLOBAL_PRE_RUN};
use crate::core::chart::RunnableChart;
use crate::models::{Command, CommandOutput, MultiError, RuntimeOptions, Step, StepError};
use crate::system::executor::{Executor, ShellExecutor};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to decode runtime options of chart '{chart}': {source}")]
    Decode {
        chart: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Chart '{chart}' has no execution directory; it must be loaded before running")]
    NotLoaded { chart: String },
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// One entry per executed command, plus a synthetic record for a failed global hook.
    pub results: Vec<CommandOutput>,
    /// Every failure of the run, in order. Empty means success.
    pub errors: MultiError,
    /// Set when a global hook failure stopped the pipeline.
    pub halted: Option<Step>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TestRunner<E: Executor = ShellExecutor> {
    executor: E,
}

impl<E: Executor> TestRunner<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Runs `chart` with its runtime defaults overlaid by `overrides`.
    ///
    /// Only decoding the chart's runtime defaults can fail here; everything that goes
    /// wrong while executing is reported in the returned [`RunOutcome`].
    pub fn run(
        &self,
        chart: &dyn RunnableChart,
        overrides: &RuntimeOptions,
    ) -> Result<RunOutcome, RunnerError> {
        let defaults = RuntimeOptions::from_mapping(chart.runtime_defaults()).map_err(|source| {
            RunnerError::Decode {
                chart: chart.name().to_string(),
                source,
            }
        })?;
        let options = defaults.merged_with(overrides);
        let dir = chart.runner_directory().ok_or_else(|| RunnerError::NotLoaded {
            chart: chart.name().to_string(),
        })?;
        debug!(
            "Running chart '{}' in '{}': {} pre hook(s), {} command(s), {} post hook(s)",
            chart.name(),
            dir.display(),
            options.pre.len(),
            options.commands.len(),
            options.post.len()
        );

        let mut outcome = RunOutcome::default();

        if !self.run_global(Step::GlobalPre, GLOBAL_PRE_RUN, &options.pre, dir, &mut outcome) {
            return Ok(outcome);
        }

        for command in &options.commands {
            let result = self.run_command(command, dir);
            if let Some(errors) = &result.error {
                outcome.errors.extend(errors);
            }
            outcome.results.push(result);
        }

        self.run_global(Step::GlobalPost, GLOBAL_POST_RUN, &options.post, dir, &mut outcome);
        Ok(outcome)
    }

    /// Runs global hooks in order until one fails. Returns `false` when the pipeline
    /// must stop; the failure has then been recorded in `outcome`.
    fn run_global(
        &self,
        step: Step,
        label: &str,
        hooks: &[String],
        dir: &Path,
        outcome: &mut RunOutcome,
    ) -> bool {
        let started = Instant::now();
        let mut collected = String::new();

        for hook in hooks {
            debug!("Running {} hook '{}'", step, hook);
            let process = self.executor.run_process(hook, dir);
            collected.push_str(&process.output);
            if let Err(source) = process.result {
                let error = StepError {
                    step,
                    command: hook.clone(),
                    source,
                };
                warn!("{}", error);
                outcome.errors.push(error.clone());
                outcome.results.push(CommandOutput::global_hook(
                    label,
                    collected,
                    error,
                    started.elapsed(),
                ));
                outcome.halted = Some(step);
                return false;
            }
        }
        true
    }

    /// Runs one command's `pre`, `run` and `post` steps. A failing step never prevents
    /// the following ones.
    fn run_command(&self, command: &Command, dir: &Path) -> CommandOutput {
        info!("Running '{}'", command.name);
        let started = Instant::now();
        let mut errors = MultiError::new();

        let mut step = |kind: Step, line: &str| -> String {
            let process = self.executor.run_process(line, dir);
            if let Err(source) = process.result {
                errors.push(StepError {
                    step: kind,
                    command: line.to_string(),
                    source,
                });
            }
            process.output
        };

        let pre_output = if command.pre.is_empty() {
            String::new()
        } else {
            step(Step::Pre, &command.pre)
        };
        let output = step(Step::Run, &command.run);
        let post_output = if command.post.is_empty() {
            String::new()
        } else {
            step(Step::Post, &command.post)
        };

        CommandOutput {
            pre_output,
            output,
            post_output,
            error: errors.into_option(),
            command: command.clone(),
            testrun: true,
            elapsed: started.elapsed(),
        }
    }
}
