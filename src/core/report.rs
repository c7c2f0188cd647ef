//! # Result Reporter
//!
//! Formats the outcome of a chart run, either for a terminal or as a JSON document.

use crate::models::CommandOutput;
use colored::*;
use serde::Serialize;
use std::io::{self, Write};

/// Counters printed after every chart.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    /// Results carrying an error.
    pub errors: usize,
    /// Every result, global hook records included.
    pub scripts: usize,
    /// Results of real test commands.
    pub tests: usize,
    /// Sum of every result's wall-clock time, in seconds.
    pub total_time: f64,
}

impl Summary {
    pub fn of(results: &[CommandOutput]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.scripts += 1;
            if r.testrun {
                acc.tests += 1;
            }
            if r.error.is_some() {
                acc.errors += 1;
            }
            acc.total_time += r.elapsed.as_secs_f64();
            acc
        })
    }
}

/// The results of one chart, ready to be printed.
#[derive(Debug, Clone, Copy)]
pub struct ChartReport<'a> {
    pub chart: &'a str,
    pub version: &'a str,
    pub source: &'a str,
    pub results: &'a [CommandOutput],
}

#[derive(Serialize)]
struct JsonResult<'a> {
    name: &'a str,
    command: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    pre_output: &'a str,
    output: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    post_output: &'a str,
    errors: Vec<String>,
    testrun: bool,
    elapsed: f64,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    chart: &'a str,
    version: &'a str,
    source: &'a str,
    success: bool,
    summary: Summary,
    results: Vec<JsonResult<'a>>,
}

impl ChartReport<'_> {
    pub fn summary(&self) -> Summary {
        Summary::of(self.results)
    }

    pub fn succeeded(&self) -> bool {
        self.results.iter().all(CommandOutput::succeeded)
    }

    /// Writes one block per result followed by the summary line.
    pub fn write_human<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for result in self.results {
            writeln!(out, "{}", "===========".dimmed())?;
            writeln!(
                out,
                "[{}: {}] [{}: {}]",
                t!("report.label.name"),
                result.command.name.bold(),
                t!("report.label.command"),
                result.command.run
            )?;
            if !result.pre_output.is_empty() {
                writeln!(out, "  [{}]: {}", t!("report.label.pre"), result.pre_output)?;
            }
            writeln!(out, "  {}: {}", t!("report.label.output"), result.output)?;
            if !result.post_output.is_empty() {
                writeln!(out, "  [{}]: {}", t!("report.label.post"), result.post_output)?;
            }
            match &result.error {
                Some(error) => writeln!(
                    out,
                    "  {}: {}",
                    t!("report.label.error").red().bold(),
                    error.to_string().red()
                )?,
                None => writeln!(out, "  {}", t!("report.ok").green())?,
            }
        }

        let summary = self.summary();
        writeln!(out, "{}", "===========".dimmed())?;
        let line = format!(
            t!("report.summary"),
            chart = self.chart,
            version = self.version,
            scripts = summary.scripts,
            tests = summary.tests,
            errors = summary.errors,
            seconds = format!("{:.2}", summary.total_time)
        );
        if summary.errors == 0 {
            writeln!(out, "{}", line.green())
        } else {
            writeln!(out, "{}", line.red())
        }
    }

    /// Writes the report as one compact JSON document on a single line, so a run over
    /// several charts yields one line per chart.
    pub fn write_json<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let report = JsonReport {
            chart: self.chart,
            version: self.version,
            source: self.source,
            success: self.succeeded(),
            summary: self.summary(),
            results: self
                .results
                .iter()
                .map(|r| JsonResult {
                    name: &r.command.name,
                    command: &r.command.run,
                    pre_output: &r.pre_output,
                    output: &r.output,
                    post_output: &r.post_output,
                    errors: r
                        .error
                        .iter()
                        .flat_map(|e| e.iter().map(ToString::to_string))
                        .collect(),
                    testrun: r.testrun,
                    elapsed: r.elapsed.as_secs_f64(),
                })
                .collect(),
        };
        serde_json::to_writer(&mut *out, &report)?;
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Command, MultiError, Step, StepError};
    use crate::system::executor::ExecutionError;
    use std::time::Duration;

    fn ok(name: &str, output: &str) -> CommandOutput {
        CommandOutput {
            pre_output: String::new(),
            output: output.to_string(),
            post_output: String::new(),
            error: None,
            command: Command {
                name: name.into(),
                run: format!("sh {}.sh", name),
                ..Command::default()
            },
            testrun: true,
            elapsed: Duration::from_millis(250),
        }
    }

    fn failed(name: &str) -> CommandOutput {
        let error = StepError {
            step: Step::Run,
            command: format!("sh {}.sh", name),
            source: ExecutionError::NonZeroExitStatus {
                command: format!("sh {}.sh", name),
                code: Some(1),
            },
        };
        CommandOutput {
            error: Some(MultiError::from(error)),
            ..ok(name, "boom\n")
        }
    }

    fn render(report: &ChartReport<'_>, json: bool) -> String {
        let mut buffer = Vec::new();
        if json {
            report.write_json(&mut buffer).unwrap();
        } else {
            report.write_human(&mut buffer).unwrap();
        }
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn summary_counts_results() {
        let mut hook = failed("global-pre-run");
        hook.testrun = false;
        let results = vec![ok("a", "x"), failed("b"), hook];
        let summary = Summary::of(&results);
        assert_eq!(summary.scripts, 3);
        assert_eq!(summary.tests, 2);
        assert_eq!(summary.errors, 2);
        assert!((summary.total_time - 0.75).abs() < 1e-9);
    }

    #[test]
    fn human_report_lists_every_result() {
        let results = vec![ok("first", "Foo testreal\n"), failed("second")];
        let report = ChartReport {
            chart: "fixture",
            version: "0.1.0",
            source: "./fixture",
            results: &results,
        };
        let text = render(&report, false);
        assert!(text.contains("first"));
        assert!(text.contains("Foo testreal"));
        assert!(text.contains("sh second.sh"));
        assert!(text.contains("exited with"));
        assert!(text.contains("fixture"));
        assert!(!report.succeeded());
    }

    #[test]
    fn json_report_is_machine_readable() {
        let results = vec![ok("first", "hi\n"), failed("second")];
        let report = ChartReport {
            chart: "fixture",
            version: "0.1.0",
            source: "./fixture",
            results: &results,
        };
        let text = render(&report, true);
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["chart"], "fixture");
        assert_eq!(value["success"], false);
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["summary"]["scripts"], 2);
        assert_eq!(value["results"][0]["output"], "hi\n");
        assert!(value["results"][0].get("pre_output").is_none());
        assert_eq!(value["results"][1]["errors"].as_array().unwrap().len(), 1);
    }
}
