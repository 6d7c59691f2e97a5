// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Harness configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix shared by the hostnames of every test VM.
pub const DEFAULT_HOSTNAME_PREFIX: &str = "migrate-tests-";

/// Backoff and per-request limits for the service poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay between attempts.
    pub max_backoff: Duration,
    /// Connect and read timeout for a single request.
    pub request_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Paths, programs and limits used by a test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory containing one provisioner template per subdirectory.
    pub vmdefs_dir: PathBuf,
    /// Prefix joined to a definition name to form the VM hostname.
    pub hostname_prefix: String,
    /// Provisioner executable.
    pub provisioner: String,
    /// Installed location of the CLI under test.
    pub cli_tool: PathBuf,
    /// Working directory for CLI invocations.
    pub cli_work_dir: PathBuf,
    /// SSH identity handed to `migrate-machine`.
    pub identity_file: PathBuf,
    /// Program used to elevate CLI invocations, `None` to run directly.
    pub privilege_program: Option<String>,
    /// Ask for elevated privileges once at suite start.
    pub preflight_privileges: bool,
    /// Kill external commands that run longer than this.
    pub command_timeout: Option<Duration>,
    pub poll: PollSettings,
}

impl HarnessConfig {
    /// Builds the default layout rooted at a repository checkout.
    #[must_use]
    pub fn for_repo(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let bin_dir = root.join("bin");
        Self {
            vmdefs_dir: root.join("integration-tests").join("vmdefs"),
            hostname_prefix: DEFAULT_HOSTNAME_PREFIX.to_string(),
            provisioner: String::from("vagrant"),
            cli_tool: bin_dir.join("migrate-tool"),
            cli_work_dir: bin_dir,
            identity_file: root
                .join("integration-tests")
                .join("config")
                .join("testing_key"),
            privilege_program: Some(String::from("sudo")),
            preflight_privileges: true,
            command_timeout: None,
            poll: PollSettings::default(),
        }
    }
}
