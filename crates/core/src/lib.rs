// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Resource orchestration for migration integration tests.
//!
//! Provisions local VMs, drives the migration CLI against them and observes
//! the services they host, with every expensive resource released through
//! nested suite, feature and scenario scopes.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod cli;
mod command;
mod config;
mod error;
mod http;
mod lifecycle;
mod poller;
mod scope;
mod vm;

#[cfg(test)]
mod tests;

pub use cli::CliHelper;
pub use command::{CommandRunner, CommandSpec, DuctRunner};
pub use config::{DEFAULT_HOSTNAME_PREFIX, HarnessConfig, PollSettings};
pub use error::{
    AssertionFailures, CheckOutcome, CleanupErrors, HarnessError, ORIGINAL_STATUS,
    REDEPLOYED_STATUS, RESPONSE_TIME, SAME_RESPONSE, evaluate_checks,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient, service_url};
pub use lifecycle::{GroupStatus, Lifecycle, ScenarioContext};
pub use poller::{ResponseComparison, ServicePoller, UrlCheck};
pub use scope::ResourceScope;
pub use vm::{VmDefinitions, VmOrchestrator};
