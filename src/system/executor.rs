// src/system/executor.rs

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command as StdCommand, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ExecutionError {
    #[error("Shell invocation could not be parsed: '{0}'")]
    ShellParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{command}' could not be executed: {source}")]
    Spawn {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Command '{command}' could not be awaited: {source}")]
    Wait {
        command: String,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("Command '{command}' exited with {}", exit_description(.code))]
    NonZeroExitStatus { command: String, code: Option<i32> },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by a signal)".to_string(),
    }
}

/// What a finished process left behind: everything it printed, and whether it succeeded.
/// The output is kept even when the process failed.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub output: String,
    pub result: Result<(), ExecutionError>,
}

impl ProcessOutcome {
    fn failed(error: ExecutionError) -> Self {
        Self {
            output: String::new(),
            result: Err(error),
        }
    }

    pub fn into_result(self) -> Result<String, ExecutionError> {
        self.result.map(|()| self.output)
    }
}

/// Launches shell command strings. The runner only ever talks to this trait.
pub trait Executor {
    /// Runs `command_line` through a shell rooted at `cwd` and waits for it to exit.
    /// A non-zero exit or a launch failure is reported in [`ProcessOutcome::result`].
    fn run_process(&self, command_line: &str, cwd: &Path) -> ProcessOutcome;
}

/// The production executor: `<shell> <args...> "<command_line>"`, combined stdout/stderr
/// captured and (optionally) mirrored to the console while the command runs.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: String,
    args: Vec<String>,
    stream_output: bool,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        let (program, args) = if cfg!(target_os = "windows") {
            ("cmd", vec!["/C".to_string()])
        } else {
            ("sh", vec!["-c".to_string()])
        };
        Self {
            program: program.to_string(),
            args,
            stream_output: true,
        }
    }
}

impl ShellExecutor {
    /// Builds an executor from a shell invocation such as `"bash -ec"`.
    pub fn new(shell: &str, stream_output: bool) -> Result<Self, ExecutionError> {
        let mut parts = shlex::split(shell)
            .ok_or_else(|| ExecutionError::ShellParse(shell.to_string()))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| ExecutionError::ShellParse(shell.to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            stream_output,
        })
    }

    pub fn with_streaming(mut self, stream_output: bool) -> Self {
        self.stream_output = stream_output;
        self
    }
}

impl Executor for ShellExecutor {
    fn run_process(&self, command_line: &str, cwd: &Path) -> ProcessOutcome {
        if command_line.trim().is_empty() {
            return ProcessOutcome::failed(ExecutionError::EmptyCommand);
        }

        let clean_cwd = dunce::simplified(cwd);
        log::debug!(
            "Running '{}' via '{}' in {}",
            command_line,
            self.program,
            clean_cwd.display()
        );

        let spawned = StdCommand::new(&self.program)
            .args(&self.args)
            .arg(command_line)
            .current_dir(clean_cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return ProcessOutcome::failed(ExecutionError::Spawn {
                    command: command_line.to_string(),
                    source: Arc::new(e),
                });
            }
        };

        // Both pipes are drained concurrently so neither can fill up and block the child.
        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let sink = Arc::clone(&captured);
            let stream = self.stream_output;
            pumps.push(thread::spawn(move || pump(stdout, sink, stream.then(io::stdout))));
        }
        if let Some(stderr) = child.stderr.take() {
            let sink = Arc::clone(&captured);
            let stream = self.stream_output;
            pumps.push(thread::spawn(move || pump(stderr, sink, stream.then(io::stderr))));
        }

        let status = child.wait();
        for handle in pumps {
            if handle.join().is_err() {
                log::warn!("Output reader for '{}' panicked.", command_line);
            }
        }

        let output = captured
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        let result = match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(ExecutionError::NonZeroExitStatus {
                command: command_line.to_string(),
                code: status.code(),
            }),
            Err(e) => Err(ExecutionError::Wait {
                command: command_line.to_string(),
                source: Arc::new(e),
            }),
        };
        log::trace!("'{}' finished: {:?}", command_line, result);

        ProcessOutcome { output, result }
    }
}

/// Copies everything from `reader` into the shared capture buffer, echoing to `console`.
fn pump<R: Read, W: Write>(mut reader: R, sink: Arc<Mutex<Vec<u8>>>, mut console: Option<W>) {
    let mut buffer = [0u8; 8192];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("Stopped reading child output: {}", e);
                break;
            }
        };
        let Some(chunk) = buffer.get(..read) else {
            break;
        };
        if let Some(out) = console.as_mut() {
            let _ = out.write_all(chunk);
            let _ = out.flush();
        }
        if let Ok(mut captured) = sink.lock() {
            captured.extend_from_slice(chunk);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn quiet() -> ShellExecutor {
        ShellExecutor::default().with_streaming(false)
    }

    #[test]
    fn captures_stdout() {
        let dir = TempDir::new().unwrap();
        let outcome = quiet().run_process("echo hello", dir.path());
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.output, "hello\n");
    }

    #[test]
    fn captures_stderr_into_the_same_buffer() {
        let dir = TempDir::new().unwrap();
        let output = quiet()
            .run_process("echo oops 1>&2", dir.path())
            .into_result()
            .unwrap();
        assert_eq!(output, "oops\n");
    }

    #[test]
    fn runs_in_the_given_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let output = quiet()
            .run_process("cat marker.txt", dir.path())
            .into_result()
            .unwrap();
        assert_eq!(output, "here");
    }

    #[test]
    fn non_zero_exit_keeps_output() {
        let dir = TempDir::new().unwrap();
        let outcome = quiet().run_process("echo partial; exit 3", dir.path());
        assert_eq!(outcome.output, "partial\n");
        match outcome.result {
            Err(ExecutionError::NonZeroExitStatus { code, .. }) => assert_eq!(code, Some(3)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_shell_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let executor = ShellExecutor::new("definitely-not-a-shell-binary -c", false).unwrap();
        let outcome = executor.run_process("echo hi", dir.path());
        assert!(matches!(outcome.result, Err(ExecutionError::Spawn { .. })));
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = TempDir::new().unwrap();
        let outcome = quiet().run_process("   ", dir.path());
        assert!(matches!(outcome.result, Err(ExecutionError::EmptyCommand)));
    }

    #[test]
    fn shell_spec_is_split_like_a_shell() {
        let executor = ShellExecutor::new("bash -e -c", true).unwrap();
        assert_eq!(executor.program, "bash");
        assert_eq!(executor.args, vec!["-e", "-c"]);
        assert!(ShellExecutor::new("", true).is_err());
        assert!(ShellExecutor::new("\"unterminated", true).is_err());
    }
}
