// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use migrate_harness_domain::{TestGroup, should_skip};

use crate::{Args, Command};

fn parse(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("migrate-harness").chain(argv.iter().copied())).unwrap()
}

#[test]
fn test_command_definition_is_consistent() {
    Args::command().debug_assert();
}

#[test]
fn test_config_defaults_follow_repo_root() {
    let args = parse(&["--repo-root", "/src/migrate", "definitions"]);
    let config = args.config();

    assert_eq!(
        config.vmdefs_dir,
        PathBuf::from("/src/migrate/integration-tests/vmdefs")
    );
    assert_eq!(config.cli_tool, PathBuf::from("/src/migrate/bin/migrate-tool"));
    assert_eq!(config.privilege_program.as_deref(), Some("sudo"));
    assert_eq!(config.command_timeout, None);
}

#[test]
fn test_no_sudo_and_timeout_options() {
    let args = parse(&["definitions", "--no-sudo", "--command-timeout", "90"]);
    let config = args.config();

    assert_eq!(config.privilege_program, None);
    assert_eq!(config.command_timeout, Some(Duration::from_secs(90)));
}

#[test]
fn test_repeated_tags_build_filter() {
    let args = parse(&["--tags", "skip,slow", "--tags", "~wip", "definitions"]);
    let filter = args.filter().unwrap();

    assert!(filter.check(["skip"]));
    assert!(!filter.check(["skip", "wip"]));
}

#[test]
fn test_wip_flag_replaces_tags() {
    let args = parse(&["--tags", "skip", "--wip", "definitions"]);
    let filter = args.filter().unwrap();

    assert!(filter.check(["wip"]));
    assert!(!filter.check(["skip"]));
}

#[test]
fn test_invalid_tag_expression_is_rejected() {
    let args = parse(&["--tags", "~", "definitions"]);
    assert!(args.filter().is_err());
}

#[test]
fn test_should_skip_splits_group_tags() {
    let args = parse(&["should-skip", "--group-tags", "@skip,slow"]);
    let filter = args.filter().unwrap();
    let Command::ShouldSkip { name, group_tags } = args.command else {
        panic!("expected should-skip");
    };

    assert_eq!(name, "group");
    assert_eq!(group_tags, vec!["@skip", "slow"]);
    let group = TestGroup::new(name, &group_tags);
    assert!(should_skip(&group, &filter));
}

#[test]
fn test_probe_wait_is_optional() {
    let args = parse(&["probe", "http://10.0.0.5/"]);
    assert!(matches!(
        args.command,
        Command::Probe { ref url, wait: None } if url == "http://10.0.0.5/"
    ));

    let args = parse(&["probe", "http://10.0.0.5/", "--wait", "30"]);
    assert!(matches!(args.command, Command::Probe { wait: Some(30), .. }));
}

#[test]
fn test_redeploy_defaults() {
    let args = parse(&[
        "redeploy",
        "--source-def",
        "centos7-httpd",
        "--target-def",
        "centos7-target",
        "--tag",
        "slow",
    ]);
    let Command::Redeploy(redeploy) = args.command else {
        panic!("expected redeploy");
    };

    assert_eq!(redeploy.source_def, "centos7-httpd");
    assert_eq!(redeploy.target_def, "centos7-target");
    assert_eq!(redeploy.port, 80);
    assert_eq!(redeploy.status, 200);
    assert_eq!(redeploy.wait_for_target, 30);
    assert!(!redeploy.destroy);
    assert!(!redeploy.eager_teardown);
    assert_eq!(redeploy.tags, vec!["slow"]);
}

#[test]
fn test_redeploy_requires_both_definitions() {
    let result = Args::try_parse_from([
        "migrate-harness",
        "redeploy",
        "--source-def",
        "centos7-httpd",
    ]);
    assert!(result.is_err());
}
