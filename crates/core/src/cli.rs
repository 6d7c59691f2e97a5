// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Invocations of the migration CLI under test.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use migrate_harness_domain::MigrationInfo;

use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::error::{CheckOutcome, RESPONSE_TIME, evaluate_checks};
use crate::vm::VmOrchestrator;
use crate::HarnessError;

/// Runs the CLI with elevated privileges against the scenario's VMs.
pub struct CliHelper {
    vms: Rc<VmOrchestrator>,
    runner: Rc<dyn CommandRunner>,
    privilege_program: Option<String>,
    tool: PathBuf,
    work_dir: PathBuf,
    identity_file: PathBuf,
}

impl CliHelper {
    #[must_use]
    pub fn new(
        vms: Rc<VmOrchestrator>,
        runner: Rc<dyn CommandRunner>,
        config: &HarnessConfig,
    ) -> Self {
        Self {
            vms,
            runner,
            privilege_program: config.privilege_program.clone(),
            tool: config.cli_tool.clone(),
            work_dir: config.cli_work_dir.clone(),
            identity_file: config.identity_file.clone(),
        }
    }

    /// Recreates the source VM as a macrocontainer on the target VM.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::UnboundName` if either VM name is unbound, the
    /// CLI's error if a command fails, or `HarnessError::Domain` if the
    /// machine listing cannot be parsed.
    pub fn redeploy_as_macrocontainer(
        &self,
        source_vm: &str,
        target_vm: &str,
    ) -> Result<MigrationInfo, HarnessError> {
        let source_host = self.vms.get_hostname(source_vm)?;
        let target_host = self.vms.get_hostname(target_vm)?;

        let identity = self.identity_file.to_string_lossy().into_owned();
        self.run_tool(&[
            "migrate-machine",
            "--identity",
            identity.as_str(),
            "-t",
            target_host.as_str(),
            source_host.as_str(),
        ])?;
        tracing::info!("Redeployed {source_host} as macrocontainer on {target_host}");

        let listing = self.run_tool(&["list-machines", "--shallow"])?;
        let info = MigrationInfo::from_listing_json(&listing, &source_host, &target_host)?;
        Ok(info)
    }

    /// Runs the CLI and checks it finished within `time_limit`.
    ///
    /// Returns the command's stdout.
    ///
    /// # Errors
    ///
    /// Returns the CLI's error if the command fails, or
    /// `HarnessError::Assertion` if it took longer than `time_limit`.
    pub fn check_response_time<S: AsRef<str>>(
        &self,
        args: &[S],
        time_limit: Duration,
    ) -> Result<String, HarnessError> {
        let start = Instant::now();
        let output = self.run_tool(args)?;
        let response_time = start.elapsed();
        tracing::debug!("CLI responded in {response_time:?}");
        evaluate_checks(vec![CheckOutcome::at_most(
            RESPONSE_TIME,
            time_limit,
            response_time,
        )])?;
        Ok(output)
    }

    /// Runs the CLI with the given arguments and returns its stdout.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::CommandFailure` if the CLI exits unsuccessfully.
    pub fn run_tool<S: AsRef<str>>(&self, args: &[S]) -> Result<String, HarnessError> {
        let tool = self.tool.to_string_lossy().into_owned();
        let args = args.iter().map(|arg| arg.as_ref().to_string());
        let command = match &self.privilege_program {
            Some(program) => CommandSpec::new(program).arg(tool).args(args),
            None => CommandSpec::new(tool).args(args),
        };
        self.runner.run(&command.cwd(&self.work_dir), false)
    }
}

impl std::fmt::Debug for CliHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliHelper")
            .field("privilege_program", &self.privilege_program)
            .field("tool", &self.tool)
            .field("work_dir", &self.work_dir)
            .field("identity_file", &self.identity_file)
            .finish_non_exhaustive()
    }
}
