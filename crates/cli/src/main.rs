// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! # migrate-harness
//!
//! Runs migration scenarios against local VMs and inspects the pieces the
//! scenarios are built from.
//!
//! - `migrate-harness definitions` lists the VM templates found under
//!   `integration-tests/vmdefs`
//! - `migrate-harness should-skip --group-tags skip,wip` prints the skip
//!   decision for a tag set under the active `--tags`/`--wip` filter
//! - `migrate-harness probe http://10.0.0.5/ --wait 30` fetches one response
//! - `migrate-harness redeploy --source-def centos7-httpd --target-def
//!   centos7-target` runs a complete redeployment scenario and tears the VMs
//!   down afterwards

#![deny(
    clippy::pedantic,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod redeploy;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use color_eyre::Result;
use migrate_harness::{HarnessConfig, HttpClient, ReqwestClient, ServicePoller, VmDefinitions};
use migrate_harness_domain::{TagFilter, TestGroup, should_skip};
use tracing::level_filters::LevelFilter;
use tracing_log::AsTrace;
use tracing_subscriber::EnvFilter;

use crate::redeploy::RedeployArgs;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(args.log_level().into())
                .from_env_lossy(),
        )
        .without_time()
        .init();

    match args.run() {
        Ok(()) => (),
        Err(err) => {
            tracing::error!("{err:?}");
            std::process::exit(1);
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "migrate-harness", version, about, styles = clap_cargo::style::CLAP_STYLING)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Repository checkout holding `integration-tests/` and `bin/`
    #[arg(long, global = true, default_value = ".")]
    repo_root: PathBuf,

    /// Tag expression, repeat to require several clauses
    #[arg(long = "tags", global = true, value_name = "EXPR")]
    tags: Vec<String>,

    /// Only consider work-in-progress groups
    #[arg(long, global = true)]
    wip: bool,

    /// Run the CLI under test without sudo
    #[arg(long, global = true)]
    no_sudo: bool,

    /// Kill external commands that run longer than this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    command_timeout: Option<u64>,
}

impl Args {
    fn run(self) -> Result<()> {
        let config = self.config();
        let filter = self.filter()?;
        match self.command {
            Command::Definitions => list_definitions(&config),
            Command::ShouldSkip { name, group_tags } => {
                print_skip_decision(&name, &group_tags, &filter);
                Ok(())
            }
            Command::Probe { url, wait } => probe(&config, &url, wait.map(Duration::from_secs)),
            Command::Redeploy(redeploy) => redeploy::run(config, filter, &redeploy),
        }
    }

    fn log_level(&self) -> LevelFilter {
        self.verbosity.log_level_filter().as_trace()
    }

    fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::for_repo(&self.repo_root);
        if self.no_sudo {
            config.privilege_program = None;
        }
        config.command_timeout = self.command_timeout.map(Duration::from_secs);
        config
    }

    fn filter(&self) -> Result<TagFilter> {
        Ok(TagFilter::parse(&self.tags, self.wip)?)
    }
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// List the VM definitions available to scenarios
    #[command(visible_alias = "defs")]
    Definitions,

    /// Print whether a group with the given tags would be skipped
    ShouldSkip {
        /// Group name used in the log line
        #[arg(long, default_value = "group")]
        name: String,

        /// Comma separated tags carried by the group
        #[arg(long, value_delimiter = ',')]
        group_tags: Vec<String>,
    },

    /// Fetch a single response from a service
    Probe {
        url: String,

        /// Keep retrying for up to this many seconds
        #[arg(long, value_name = "SECS")]
        wait: Option<u64>,
    },

    /// Redeploy a source VM as a macrocontainer and compare its service
    Redeploy(RedeployArgs),
}

fn list_definitions(config: &HarnessConfig) -> Result<()> {
    let definitions = VmDefinitions::discover(&config.vmdefs_dir, &config.hostname_prefix)?;
    for (hostname, path) in definitions.iter() {
        println!("{hostname}\t{}", path.display());
    }
    Ok(())
}

fn print_skip_decision(name: &str, tags: &[String], filter: &TagFilter) {
    let group = TestGroup::new(name, tags.iter().map(String::as_str));
    tracing::debug!("'{}' carries tags {:?}", group.name(), group.tags());
    if should_skip(&group, filter) {
        println!("skip");
    } else {
        println!("run");
    }
}

fn probe(config: &HarnessConfig, url: &str, wait: Option<Duration>) -> Result<()> {
    let client: Rc<dyn HttpClient> = Rc::new(ReqwestClient::new(config.poll.request_timeout)?);
    let poller = ServicePoller::new(client, config.poll);
    let response = poller.get_response(url, wait)?;
    println!("{}", response.status);
    println!("{}", response.body);
    Ok(())
}
