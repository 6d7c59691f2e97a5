// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! External command execution.
//!
//! Every provisioner and CLI call goes through [`CommandRunner`], so the
//! orchestration code can be exercised against a scripted runner in tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::HarnessError;

const TIMEOUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An argv-style command together with its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The full argv, program first.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    fn to_expression(&self) -> duct::Expression {
        let mut expression = duct::cmd(&self.program, &self.args)
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        if let Some(dir) = &self.cwd {
            expression = expression.dir(dir);
        }
        expression
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.argv())?;
        if let Some(dir) = &self.cwd {
            write!(f, " in {}", dir.display())?;
        }
        Ok(())
    }
}

/// Executes external commands on behalf of the harness.
pub trait CommandRunner {
    /// Runs `command` once and returns its captured stdout.
    ///
    /// A nonzero exit is reported as `HarnessError::CommandFailure` unless
    /// `ignore_errors` is set, in which case stdout is returned anyway.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started, times out, or fails
    /// while `ignore_errors` is false.
    fn run(&self, command: &CommandSpec, ignore_errors: bool) -> Result<String, HarnessError>;
}

/// Runs commands as real subprocesses through `duct`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuctRunner {
    timeout: Option<Duration>,
}

impl DuctRunner {
    /// Creates a runner. With a timeout, overrunning commands are killed.
    #[must_use]
    pub const fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for DuctRunner {
    fn run(&self, command: &CommandSpec, ignore_errors: bool) -> Result<String, HarnessError> {
        let output = command
            .to_expression()
            .run_with_trace(command, self.timeout)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() || ignore_errors {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::error!("=== stdout for failed command ===\n{stdout}");
        tracing::error!("=== stderr for failed command ===\n{stderr}");
        Err(HarnessError::CommandFailure {
            program: command.program.clone(),
            exit_code: output.status.code(),
            stdout,
            stderr,
        })
    }
}

/// An extension trait for `duct::Expression` that logs the command being run
/// before running it.
trait ExpressionExt {
    /// Run the command to completion, killing it if it outlives `timeout`.
    fn run_with_trace(
        &self,
        command: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<Output, HarnessError>;
}

impl ExpressionExt for duct::Expression {
    fn run_with_trace(
        &self,
        command: &CommandSpec,
        timeout: Option<Duration>,
    ) -> Result<Output, HarnessError> {
        tracing::info!("running command: {command}");
        let spawn_error = |source| {
            // The command that was run may have scrolled off the screen, so repeat it here
            tracing::error!("failed to run command: {command}");
            HarnessError::Spawn {
                program: command.program.clone(),
                source,
            }
        };

        let Some(timeout) = timeout else {
            return self.run().map_err(spawn_error);
        };

        // A timeout too large to represent as an instant never expires.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.run().map_err(spawn_error);
        };
        let handle = self.start().map_err(spawn_error)?;
        loop {
            if let Some(output) = handle.try_wait().map_err(spawn_error)? {
                return Ok(output.clone());
            }
            if Instant::now() >= deadline {
                if let Err(err) = handle.kill() {
                    tracing::warn!("failed to kill timed out command {command}: {err}");
                }
                tracing::error!("command timed out after {timeout:?}: {command}");
                return Err(HarnessError::CommandTimeout {
                    program: command.program.clone(),
                    timeout,
                });
            }
            sleep(TIMEOUT_POLL_INTERVAL);
        }
    }
}
