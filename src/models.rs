// src/models.rs

use crate::system::executor::ExecutionError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// --- CHART MODELS (What is read from the chart on disk) ---

/// The identity of a chart, read from `metadata.yaml`. Both fields are required.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartMetadata {
    pub name: String,
    pub version: String,
}

// --- RUNTIME OPTION MODELS (runtime.yaml / --run / --run-files) ---

/// A single test command. Only `run` is mandatory; `pre` and `post` are optional hooks
/// executed around it.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Command {
    #[serde(deserialize_with = "scalar_string")]
    pub name: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub pre: String,
    #[serde(deserialize_with = "scalar_string")]
    pub run: String,
    #[serde(deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub post: String,
}

impl Command {
    /// Builds a label-only command, used for the synthetic global hook records.
    pub fn labeled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// The runtime options of a chart: global hooks plus the ordered list of test commands.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RuntimeOptions {
    pub pre: Vec<String>,
    pub post: Vec<String>,
    pub commands: Vec<Command>,
}

/// Raised by [`RuntimeOptions::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("Command #{index} ('{name}') has no 'run' step.")]
    EmptyRun { index: usize, name: String },
    #[error("Global '{hook}' hook #{index} is blank.")]
    BlankHook { hook: &'static str, index: usize },
}

impl RuntimeOptions {
    /// Decodes a raw value mapping into runtime options.
    /// Fails when a field has the wrong shape (e.g. a scalar where a sequence is expected).
    pub fn from_mapping(mapping: &Mapping) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(mapping.clone()))
    }

    /// Overlays `overrides` on top of `self`, field by field.
    ///
    /// A field of `overrides` replaces the base field only when it is non-empty.
    /// Sequences are replaced wholesale, never concatenated.
    pub fn merged_with(mut self, overrides: &Self) -> Self {
        if !overrides.pre.is_empty() {
            self.pre = overrides.pre.clone();
        }
        if !overrides.post.is_empty() {
            self.post = overrides.post.clone();
        }
        if !overrides.commands.is_empty() {
            self.commands = overrides.commands.clone();
        }
        self
    }

    /// Rejects commands without a `run` step. The runner itself never validates.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for (hook, lines) in [("pre", &self.pre), ("post", &self.post)] {
            if let Some(index) = lines.iter().position(|line| line.trim().is_empty()) {
                return Err(OptionsError::BlankHook { hook, index });
            }
        }
        for (index, command) in self.commands.iter().enumerate() {
            if command.run.trim().is_empty() {
                return Err(OptionsError::EmptyRun {
                    index,
                    name: command.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty() && self.commands.is_empty()
    }
}

/// Accepts any YAML scalar for a string field, so `--run commands[0].name=1` still decodes.
/// Sequences and mappings are rejected.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            describe(&other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

// --- EXECUTION RESULT MODELS ---

/// Which step of the pipeline produced a failure.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    GlobalPre,
    Pre,
    Run,
    Post,
    GlobalPost,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::GlobalPre => "global pre",
            Self::Pre => "pre",
            Self::Run => "run",
            Self::Post => "post",
            Self::GlobalPost => "global post",
        };
        f.write_str(label)
    }
}

/// A failed shell step, tagged with where it happened.
#[derive(Error, Debug, Clone)]
#[error("failed running {step} step '{command}': {source}")]
pub struct StepError {
    pub step: Step,
    pub command: String,
    #[source]
    pub source: ExecutionError,
}

/// An accumulation of step failures. Empty means success.
#[derive(Debug, Clone, Default)]
pub struct MultiError {
    errors: Vec<StepError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: StepError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: &Self) {
        self.errors.extend(other.errors.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepError> {
        self.errors.iter()
    }

    /// `None` when nothing was recorded.
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl From<StepError> for MultiError {
    fn from(error: StepError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            write!(f, "1 error occurred:")?;
        } else {
            write!(f, "{} errors occurred:", self.errors.len())?;
        }
        for error in &self.errors {
            write!(f, "\n\t* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// The result of executing one command (or a synthetic global hook record).
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub pre_output: String,
    pub output: String,
    pub post_output: String,
    pub error: Option<MultiError>,
    pub command: Command,
    /// `true` for real test commands, `false` for `global-pre-run`/`global-post-run` records.
    pub testrun: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Builds the record for a failed global hook.
    pub fn global_hook(label: &str, output: String, error: StepError, elapsed: Duration) -> Self {
        Self {
            pre_output: String::new(),
            output,
            post_output: String::new(),
            error: Some(MultiError::from(error)),
            command: Command::labeled(label),
            testrun: false,
            elapsed,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(yaml: &str) -> Result<RuntimeOptions, serde_yaml::Error> {
        let mapping: Mapping = serde_yaml::from_str(yaml).unwrap();
        RuntimeOptions::from_mapping(&mapping)
    }

    #[test]
    fn decodes_full_schema() {
        let opts = options(
            "pre: [\"echo a\"]\npost: [\"echo z\"]\ncommands:\n  - name: t\n    pre: setup\n    run: bash test.sh\n",
        )
        .unwrap();
        assert_eq!(opts.pre, vec!["echo a"]);
        assert_eq!(opts.post, vec!["echo z"]);
        assert_eq!(opts.commands.len(), 1);
        assert_eq!(opts.commands[0].pre, "setup");
        assert_eq!(opts.commands[0].run, "bash test.sh");
        assert!(opts.commands[0].post.is_empty());
    }

    #[test]
    fn scalar_where_sequence_expected_is_a_decode_error() {
        assert!(options("pre: \"echo a\"\n").is_err());
        assert!(options("commands: foo\n").is_err());
    }

    #[test]
    fn sequence_where_string_expected_is_a_decode_error() {
        let err = options("commands:\n  - name: [a, b]\n    run: x\n").unwrap_err();
        assert!(err.to_string().contains("expected a string"));
    }

    #[test]
    fn numeric_names_are_accepted_as_strings() {
        let opts = options("commands:\n  - name: 1\n    run: true\n").unwrap();
        assert_eq!(opts.commands[0].name, "1");
        assert_eq!(opts.commands[0].run, "true");
    }

    #[test]
    fn override_replaces_only_non_empty_fields() {
        let base = RuntimeOptions {
            pre: vec!["base-pre".into()],
            post: vec!["base-post".into()],
            commands: vec![Command {
                name: "base".into(),
                run: "true".into(),
                ..Default::default()
            }],
        };
        let overrides = RuntimeOptions {
            pre: vec!["o1".into(), "o2".into()],
            ..Default::default()
        };

        let merged = base.clone().merged_with(&overrides);
        assert_eq!(merged.pre, vec!["o1", "o2"]);
        assert_eq!(merged.post, base.post);
        assert_eq!(merged.commands, base.commands);
    }

    #[test]
    fn override_sequences_are_not_concatenated() {
        let base = RuntimeOptions {
            commands: vec![
                Command { name: "a".into(), run: "a".into(), ..Default::default() },
                Command { name: "b".into(), run: "b".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let overrides = RuntimeOptions {
            commands: vec![Command { name: "c".into(), run: "c".into(), ..Default::default() }],
            ..Default::default()
        };
        let merged = base.merged_with(&overrides);
        assert_eq!(merged.commands.len(), 1);
        assert_eq!(merged.commands[0].name, "c");
    }

    #[test]
    fn validate_rejects_empty_run() {
        let opts = RuntimeOptions {
            commands: vec![
                Command { name: "ok".into(), run: "true".into(), ..Default::default() },
                Command { name: "broken".into(), run: "  ".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        assert_eq!(
            opts.validate(),
            Err(OptionsError::EmptyRun { index: 1, name: "broken".into() })
        );
    }

    #[test]
    fn validate_rejects_blank_global_hooks() {
        let opts = RuntimeOptions {
            pre: vec!["true".into(), "".into()],
            ..Default::default()
        };
        assert_eq!(opts.validate(), Err(OptionsError::BlankHook { hook: "pre", index: 1 }));

        let opts = RuntimeOptions {
            post: vec!["   ".into()],
            ..Default::default()
        };
        assert_eq!(opts.validate(), Err(OptionsError::BlankHook { hook: "post", index: 0 }));
    }

    #[test]
    fn multi_error_display_lists_every_failure() {
        let mut errors = MultiError::new();
        errors.push(StepError {
            step: Step::Run,
            command: "false".into(),
            source: ExecutionError::NonZeroExitStatus { command: "false".into(), code: Some(1) },
        });
        errors.push(StepError {
            step: Step::Post,
            command: "exit 2".into(),
            source: ExecutionError::NonZeroExitStatus { command: "exit 2".into(), code: Some(2) },
        });
        let text = errors.to_string();
        assert!(text.starts_with("2 errors occurred:"));
        assert!(text.contains("\n\t* failed running run step 'false'"));
        assert!(text.contains("\n\t* failed running post step 'exit 2'"));
    }
}
