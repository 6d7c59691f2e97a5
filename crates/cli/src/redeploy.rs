// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The redeploy-as-macrocontainer scenario, wrapped in the full set of
//! suite, feature and scenario hooks.

use std::rc::Rc;
use std::time::Duration;

use clap::Args;
use color_eyre::{Result, eyre::eyre};
use migrate_harness::{
    CommandRunner, DuctRunner, GroupStatus, HarnessConfig, HttpClient, Lifecycle, ReqwestClient,
    ScenarioContext, VmDefinitions,
};
use migrate_harness_domain::{TagFilter, TestGroup};

const SOURCE_NAME: &str = "source";
const TARGET_NAME: &str = "target";
const FEATURE_NAME: &str = "Redeploy VM as macrocontainer";

#[derive(Clone, Debug, Args)]
pub struct RedeployArgs {
    /// Definition the source VM is built from
    #[arg(long, value_name = "DEFINITION")]
    pub source_def: String,

    /// Definition the target VM is built from
    #[arg(long, value_name = "DEFINITION")]
    pub target_def: String,

    /// Port the service listens on
    #[arg(long, default_value_t = 80)]
    pub port: u16,

    /// Status the original service is expected to answer with
    #[arg(long, default_value_t = 200)]
    pub status: u16,

    /// Seconds the redeployed service gets to start answering
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub wait_for_target: u64,

    /// Destroy any existing VMs first and destroy them again afterwards
    #[arg(long)]
    pub destroy: bool,

    /// Seconds the machine listing may take
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub time_limit: u64,

    /// Tear the VMs down when the scenario ends instead of at exit
    #[arg(long)]
    pub eager_teardown: bool,

    /// Tag attached to the scenario, repeatable
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

impl RedeployArgs {
    fn scenario(&self) -> TestGroup {
        TestGroup::new(
            format!("{} onto {}", self.source_def, self.target_def),
            &self.tags,
        )
    }
}

/// Runs the scenario with real subprocesses and HTTP. Teardown runs whether
/// or not the scenario passed.
pub fn run(config: HarnessConfig, filter: TagFilter, args: &RedeployArgs) -> Result<()> {
    let definitions = Rc::new(VmDefinitions::discover(
        &config.vmdefs_dir,
        &config.hostname_prefix,
    )?);
    let runner: Rc<dyn CommandRunner> = Rc::new(DuctRunner::new(config.command_timeout));
    let http: Rc<dyn HttpClient> = Rc::new(ReqwestClient::new(config.poll.request_timeout)?);
    let mut lifecycle = Lifecycle::before_all(config, definitions, runner, http, filter)?;

    let outcome = run_feature(&mut lifecycle, args);
    let teardown = lifecycle.after_all();
    outcome?;
    teardown?;
    Ok(())
}

fn run_feature(lifecycle: &mut Lifecycle, args: &RedeployArgs) -> Result<()> {
    let feature = TestGroup::new(FEATURE_NAME, std::iter::empty::<&str>());
    if lifecycle.before_feature(&feature) == GroupStatus::Skipped {
        return Ok(());
    }

    let outcome = run_scenario(lifecycle, args);
    let closed = lifecycle.after_feature();
    outcome?;
    closed?;
    Ok(())
}

fn run_scenario(lifecycle: &mut Lifecycle, args: &RedeployArgs) -> Result<()> {
    let Some(mut scenario) = lifecycle.before_scenario(&args.scenario()) else {
        return Ok(());
    };
    if args.eager_teardown {
        scenario.close_vms_eagerly();
    }

    let outcome = redeploy_steps(&scenario, args);
    let closed = lifecycle.after_scenario(scenario);
    outcome?;
    closed?;
    Ok(())
}

fn redeploy_steps(scenario: &ScenarioContext, args: &RedeployArgs) -> Result<()> {
    scenario
        .vms
        .ensure_local_vm(SOURCE_NAME, &args.source_def, args.destroy)?;
    scenario
        .vms
        .ensure_local_vm(TARGET_NAME, &args.target_def, args.destroy)?;

    let info = scenario
        .cli
        .redeploy_as_macrocontainer(SOURCE_NAME, TARGET_NAME)?;
    tracing::info!("{} local VM(s) listed after migration", info.local_vm_count);

    scenario.cli.check_response_time(
        &["list-machines", "--shallow"],
        Duration::from_secs(args.time_limit),
    )?;

    let original_ip = info
        .source_ip
        .ok_or_else(|| eyre!("{SOURCE_NAME} VM has no address in the machine listing"))?;
    let redeployed_ip = info
        .target_ip
        .ok_or_else(|| eyre!("{TARGET_NAME} VM has no address in the machine listing"))?;

    let comparison = scenario.http.compare_redeployed_response(
        &original_ip,
        &redeployed_ip,
        args.port,
        args.status,
        Duration::from_secs(args.wait_for_target),
    )?;
    for check in &comparison.checks {
        tracing::info!("{}: {}", check.name, check.actual);
    }
    Ok(())
}
