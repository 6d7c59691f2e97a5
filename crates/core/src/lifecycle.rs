// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Suite, feature and scenario hooks.
//!
//! A [`Lifecycle`] owns the suite scope for the whole run and the scope of
//! the feature in progress. Each started scenario gets a fresh
//! [`ScenarioContext`] that the steps receive explicitly and that is handed
//! back at scenario end.
//!
//! ```text
//! before_all
//!   before_feature ── before_scenario ── steps ── after_scenario ── after_feature
//! after_all  (closes every scenario's VM orchestrator)
//! ```

use std::rc::Rc;

use migrate_harness_domain::{TagFilter, TestGroup, should_skip};

use crate::cli::CliHelper;
use crate::command::{CommandRunner, CommandSpec};
use crate::config::HarnessConfig;
use crate::http::HttpClient;
use crate::poller::ServicePoller;
use crate::scope::ResourceScope;
use crate::vm::{VmDefinitions, VmOrchestrator};
use crate::HarnessError;

/// Whether a feature or scenario was started or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Started,
    Skipped,
}

/// Helpers and cleanup scope for one scenario.
#[derive(Debug)]
pub struct ScenarioContext {
    pub vms: Rc<VmOrchestrator>,
    pub cli: CliHelper,
    pub http: ServicePoller,
    pub cleanup: ResourceScope,
}

impl ScenarioContext {
    /// Tears this scenario's VMs down at scenario end instead of at the end
    /// of the run.
    pub fn close_vms_eagerly(&mut self) {
        let vms = Rc::clone(&self.vms);
        self.cleanup.register(move || vms.close());
    }
}

/// Hook state for a whole test run.
pub struct Lifecycle {
    config: HarnessConfig,
    definitions: Rc<VmDefinitions>,
    runner: Rc<dyn CommandRunner>,
    http: Rc<dyn HttpClient>,
    filter: TagFilter,
    global_cleanup: ResourceScope,
    feature_cleanup: Option<ResourceScope>,
    scenarios_started: usize,
    scenarios_finished: usize,
    scenarios_skipped: usize,
}

impl Lifecycle {
    /// Starts the suite.
    ///
    /// Unless disabled, elevated privileges are requested immediately so an
    /// interactive password prompt does not stall the run midway.
    ///
    /// # Errors
    ///
    /// Returns the runner's error if the privilege preflight fails.
    pub fn before_all(
        config: HarnessConfig,
        definitions: Rc<VmDefinitions>,
        runner: Rc<dyn CommandRunner>,
        http: Rc<dyn HttpClient>,
        filter: TagFilter,
    ) -> Result<Self, HarnessError> {
        if config.preflight_privileges
            && let Some(program) = &config.privilege_program
        {
            let preflight =
                CommandSpec::new(program).args(["echo", "Elevated permissions needed"]);
            runner.run(&preflight, false)?;
        }

        Ok(Self {
            config,
            definitions,
            runner,
            http,
            filter,
            global_cleanup: ResourceScope::new("suite"),
            feature_cleanup: None,
            scenarios_started: 0,
            scenarios_finished: 0,
            scenarios_skipped: 0,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn filter(&self) -> &TagFilter {
        &self.filter
    }

    /// Number of scenarios started and skipped so far.
    #[must_use]
    pub const fn scenario_counts(&self) -> (usize, usize) {
        (self.scenarios_started, self.scenarios_skipped)
    }

    /// Number of started scenarios handed back through [`Self::after_scenario`].
    #[must_use]
    pub const fn scenarios_finished(&self) -> usize {
        self.scenarios_finished
    }

    /// Scope closed once at the end of the run.
    pub const fn global_cleanup(&mut self) -> &mut ResourceScope {
        &mut self.global_cleanup
    }

    /// Scope of the feature in progress, if it was started.
    pub const fn feature_cleanup(&mut self) -> Option<&mut ResourceScope> {
        self.feature_cleanup.as_mut()
    }

    /// Starts a feature. A skipped feature gets no cleanup scope.
    pub fn before_feature(&mut self, feature: &TestGroup) -> GroupStatus {
        if should_skip(feature, &self.filter) {
            tracing::info!("Skipping feature '{}': marked with @skip", feature.name());
            self.feature_cleanup = None;
            return GroupStatus::Skipped;
        }
        tracing::info!("Starting feature '{}'", feature.name());
        self.feature_cleanup = Some(ResourceScope::new(format!(
            "feature '{}'",
            feature.name()
        )));
        GroupStatus::Started
    }

    /// Starts a scenario, or returns `None` if it is skipped.
    ///
    /// The scenario's VM orchestrator is closed from the suite scope, so VMs
    /// outlive the scenario unless the steps opt in to eager teardown.
    pub fn before_scenario(&mut self, scenario: &TestGroup) -> Option<ScenarioContext> {
        if should_skip(scenario, &self.filter) {
            tracing::info!("Skipping scenario '{}': marked with @skip", scenario.name());
            self.scenarios_skipped += 1;
            return None;
        }
        self.scenarios_started += 1;
        tracing::info!("Starting scenario '{}'", scenario.name());

        let vms = Rc::new(VmOrchestrator::new(
            Rc::clone(&self.runner),
            Rc::clone(&self.definitions),
            self.config.provisioner.clone(),
        ));
        let deferred = Rc::clone(&vms);
        self.global_cleanup.register(move || deferred.close());

        let cli = CliHelper::new(Rc::clone(&vms), Rc::clone(&self.runner), &self.config);
        let http = ServicePoller::new(Rc::clone(&self.http), self.config.poll);
        Some(ScenarioContext {
            vms,
            cli,
            http,
            cleanup: ResourceScope::new(format!("scenario '{}'", scenario.name())),
        })
    }

    /// Ends a scenario by closing its scope.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cleanup` if any scenario cleanup failed.
    pub fn after_scenario(&mut self, mut scenario: ScenarioContext) -> Result<(), HarnessError> {
        tracing::debug!("closing {} scope", scenario.cleanup.label());
        self.scenarios_finished += 1;
        scenario.cleanup.close()
    }

    /// Ends the feature in progress. Does nothing for a skipped feature.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cleanup` if any feature cleanup failed.
    pub fn after_feature(&mut self) -> Result<(), HarnessError> {
        match self.feature_cleanup.take() {
            Some(mut scope) => scope.close(),
            None => Ok(()),
        }
    }

    /// Ends the run, halting or destroying every VM still up.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cleanup` if any suite cleanup failed.
    pub fn after_all(mut self) -> Result<(), HarnessError> {
        tracing::info!(
            "Run finished: {} scenario(s) started, {} finished, {} skipped",
            self.scenarios_started,
            self.scenarios_finished,
            self.scenarios_skipped
        );
        let feature = self.after_feature();
        let suite = self.global_cleanup.close();
        feature.and(suite)
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("config", &self.config)
            .field("filter", &self.filter)
            .field("global_cleanup", &self.global_cleanup)
            .field("feature_cleanup", &self.feature_cleanup)
            .field("scenarios_started", &self.scenarios_started)
            .field("scenarios_finished", &self.scenarios_finished)
            .field("scenarios_skipped", &self.scenarios_skipped)
            .finish_non_exhaustive()
    }
}
