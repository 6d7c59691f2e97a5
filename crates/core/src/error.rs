// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error taxonomy for the harness.

use std::fmt::Debug;
use std::path::PathBuf;
use std::time::Duration;

use migrate_harness_domain::DomainError;
use thiserror::Error;

/// Name of the check comparing the original service status to the expected one.
pub const ORIGINAL_STATUS: &str = "Original status";
/// Name of the check comparing the redeployed status to the original one.
pub const REDEPLOYED_STATUS: &str = "Redeployed status";
/// Name of the check comparing response bodies.
pub const SAME_RESPONSE: &str = "Same response";
/// Name of the check bounding CLI latency.
pub const RESPONSE_TIME: &str = "Response time";

/// Errors surfaced by harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// An external command exited unsuccessfully and failures were not suppressed.
    #[error("command `{program}` failed with {}", describe_exit(.exit_code.as_ref()))]
    CommandFailure {
        program: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external command exceeded the configured execution timeout.
    #[error("command `{program}` did not finish within {timeout:?}")]
    CommandTimeout { program: String, timeout: Duration },

    /// An external command could not be started or waited on.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The VM definition directory could not be listed.
    #[error("failed to read VM definitions from {}: {source}", .path.display())]
    DefinitionDiscovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No provisioner template exists for the requested definition.
    #[error("Unknown VM image: {0}")]
    UnknownImage(String),

    /// A logical VM name was used before being bound to a hostname.
    #[error("No VM is bound to the name '{0}'")]
    UnboundName(String),

    /// A single HTTP attempt failed.
    #[error("GET {url} failed: {reason}")]
    Http { url: String, reason: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    /// The service gave no response to an immediate request.
    #[error("No response from service {url}")]
    NoResponse { url: String },

    /// The service gave no response before the wait elapsed.
    #[error("No response from service {url} within {} seconds", .wait.as_secs_f64())]
    NoResponseWithinTimeout { url: String, wait: Duration },

    /// CLI output or tag input could not be interpreted.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// One or more named checks failed.
    #[error("{0}")]
    Assertion(AssertionFailures),

    /// One or more cleanup actions failed while closing a scope.
    #[error("{0}")]
    Cleanup(CleanupErrors),
}

fn describe_exit(exit_code: Option<&i32>) -> String {
    exit_code.map_or_else(
        || String::from("no exit code (terminated by signal)"),
        |code| format!("exit code {code}"),
    )
}

/// Result of a single named comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

impl CheckOutcome {
    /// Records whether `actual` equals `expected`.
    #[must_use]
    pub fn equal<T: PartialEq + Debug>(name: &'static str, expected: &T, actual: &T) -> Self {
        Self {
            name,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
            passed: expected == actual,
        }
    }

    /// Records whether `actual` is no greater than `limit`.
    #[must_use]
    pub fn at_most(name: &'static str, limit: Duration, actual: Duration) -> Self {
        Self {
            name,
            expected: format!("<= {limit:?}"),
            actual: format!("{actual:?}"),
            passed: actual <= limit,
        }
    }
}

/// Every check from one assertion group, with at least one failure among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailures {
    pub checks: Vec<CheckOutcome>,
}

impl AssertionFailures {
    /// Iterates over the checks that did not pass.
    pub fn failed(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|check| !check.passed)
    }

    /// Names of the checks that did not pass, in evaluation order.
    #[must_use]
    pub fn failed_names(&self) -> Vec<&'static str> {
        self.failed().map(|check| check.name).collect()
    }
}

impl std::fmt::Display for AssertionFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for check in self.failed() {
            if !first {
                write!(f, "; ")?;
            }
            first = false;
            write!(
                f,
                "{}: expected {}, got {}",
                check.name, check.expected, check.actual
            )?;
        }
        Ok(())
    }
}

/// Turns a group of checks into an error if any of them failed.
///
/// # Errors
///
/// Returns `HarnessError::Assertion` carrying every check when one or more failed.
pub fn evaluate_checks(checks: Vec<CheckOutcome>) -> Result<Vec<CheckOutcome>, HarnessError> {
    if checks.iter().all(|check| check.passed) {
        Ok(checks)
    } else {
        Err(HarnessError::Assertion(AssertionFailures { checks }))
    }
}

/// Failures collected while closing a resource scope.
#[derive(Debug)]
pub struct CleanupErrors {
    pub scope: String,
    pub errors: Vec<HarnessError>,
}

impl std::fmt::Display for CleanupErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cleanup action(s) failed in {} scope",
            self.errors.len(),
            self.scope
        )?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}
