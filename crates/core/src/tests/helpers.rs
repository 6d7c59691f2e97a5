// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::{
    CommandRunner, CommandSpec, HarnessConfig, HarnessError, HttpClient, HttpResponse,
    PollSettings, VmDefinitions,
};

pub const PREFIX: &str = "migrate-tests-";
pub const SOURCE_DEF: &str = "centos7-httpd";
pub const TARGET_DEF: &str = "centos7-target";

/// A scripted reply for commands whose command line contains a needle.
#[derive(Debug, Clone)]
pub enum Scripted {
    Output(String),
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// Fails even when errors are ignored, like a missing executable.
    Broken,
}

/// Records every command and answers from a script instead of running it.
#[derive(Debug, Default)]
pub struct FakeRunner {
    calls: RefCell<Vec<CommandSpec>>,
    script: RefCell<Vec<(String, Scripted)>>,
    delay: Cell<Duration>,
}

impl FakeRunner {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Replies with `reply` to any command line containing `needle`.
    /// Later rules take precedence.
    pub fn on(&self, needle: &str, reply: Scripted) {
        self.script.borrow_mut().push((needle.to_string(), reply));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay.set(delay);
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Each recorded command as a space separated command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|call| call.argv().join(" "))
            .collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &CommandSpec, ignore_errors: bool) -> Result<String, HarnessError> {
        self.calls.borrow_mut().push(command.clone());
        std::thread::sleep(self.delay.get());

        let line = command.argv().join(" ");
        let reply = self
            .script
            .borrow()
            .iter()
            .rev()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            None => Ok(String::new()),
            Some(Scripted::Output(stdout)) => Ok(stdout),
            Some(Scripted::Exit { stdout, .. }) if ignore_errors => Ok(stdout),
            Some(Scripted::Exit {
                code,
                stdout,
                stderr,
            }) => Err(HarnessError::CommandFailure {
                program: command.program.clone(),
                exit_code: Some(code),
                stdout,
                stderr,
            }),
            Some(Scripted::Broken) => Err(HarnessError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            }),
        }
    }
}

/// An HTTP client serving canned responses, optionally unreachable for a while.
#[derive(Debug, Default)]
pub struct FakeHttp {
    responses: RefCell<BTreeMap<String, HttpResponse>>,
    failures_remaining: Cell<u32>,
    available_at: Cell<Option<Instant>>,
    attempts: RefCell<Vec<(String, Option<Duration>)>>,
}

impl FakeHttp {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn serve(&self, url: &str, status: u16, body: &str) {
        self.responses.borrow_mut().insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Refuses the next `count` requests regardless of URL.
    pub fn fail_first(&self, count: u32) {
        self.failures_remaining.set(count);
    }

    /// Refuses every request until `instant`.
    pub fn unavailable_until(&self, instant: Instant) {
        self.available_at.set(Some(instant));
    }

    pub fn attempts_for(&self, url: &str) -> usize {
        self.attempts
            .borrow()
            .iter()
            .filter(|(attempted, _)| attempted == url)
            .count()
    }

    /// Timeout handed to each attempt, in order.
    pub fn attempt_timeouts(&self) -> Vec<Option<Duration>> {
        self.attempts
            .borrow()
            .iter()
            .map(|(_, timeout)| *timeout)
            .collect()
    }
}

impl HttpClient for FakeHttp {
    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse, HarnessError> {
        self.attempts.borrow_mut().push((url.to_string(), timeout));
        let refused = || HarnessError::Http {
            url: url.to_string(),
            reason: String::from("connection refused"),
        };

        if self
            .available_at
            .get()
            .is_some_and(|available| Instant::now() < available)
        {
            return Err(refused());
        }
        let remaining = self.failures_remaining.get();
        if remaining > 0 {
            self.failures_remaining.set(remaining - 1);
            return Err(refused());
        }
        self.responses.borrow().get(url).cloned().ok_or_else(refused)
    }
}

pub fn create_test_definitions() -> Rc<VmDefinitions> {
    Rc::new(VmDefinitions::from_paths(
        PREFIX,
        [
            PathBuf::from("/repo/integration-tests/vmdefs").join(SOURCE_DEF),
            PathBuf::from("/repo/integration-tests/vmdefs").join(TARGET_DEF),
        ],
    ))
}

pub fn create_test_config() -> HarnessConfig {
    let mut config = HarnessConfig::for_repo("/repo");
    config.poll = fast_poll_settings();
    config
}

pub fn fast_poll_settings() -> PollSettings {
    PollSettings {
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(20),
        request_timeout: Duration::from_millis(100),
    }
}

pub fn hostname(definition: &str) -> String {
    format!("{PREFIX}{definition}")
}
