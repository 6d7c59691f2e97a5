// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Polling services until they respond, and comparing responses across a
//! migration.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::config::PollSettings;
use crate::error::{
    CheckOutcome, ORIGINAL_STATUS, REDEPLOYED_STATUS, SAME_RESPONSE, evaluate_checks,
};
use crate::http::{HttpClient, HttpResponse, service_url};
use crate::HarnessError;

/// A URL to query, optionally allowing time for the service to come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlCheck {
    /// A response is expected on the first attempt.
    Immediate(String),
    /// Keep trying until the wait elapses.
    WaitFor { url: String, wait: Duration },
}

impl UrlCheck {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Immediate(url) | Self::WaitFor { url, .. } => url,
        }
    }

    #[must_use]
    pub const fn wait(&self) -> Option<Duration> {
        match self {
            Self::Immediate(_) => None,
            Self::WaitFor { wait, .. } => Some(*wait),
        }
    }
}

impl From<&str> for UrlCheck {
    fn from(url: &str) -> Self {
        Self::Immediate(url.to_string())
    }
}

impl From<(&str, Duration)> for UrlCheck {
    fn from((url, wait): (&str, Duration)) -> Self {
        Self::WaitFor {
            url: url.to_string(),
            wait,
        }
    }
}

/// Both responses from a redeployment comparison and the checks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseComparison {
    pub original: HttpResponse,
    pub redeployed: HttpResponse,
    pub checks: Vec<CheckOutcome>,
}

/// Queries HTTP services on the test VMs.
pub struct ServicePoller {
    client: Rc<dyn HttpClient>,
    settings: PollSettings,
}

impl ServicePoller {
    #[must_use]
    pub fn new(client: Rc<dyn HttpClient>, settings: PollSettings) -> Self {
        Self { client, settings }
    }

    /// Gets a response from `url`.
    ///
    /// Without `wait_for_connection` exactly one attempt is made. With it,
    /// failed attempts are retried with a doubling backoff until a response
    /// arrives or the wait has elapsed. Each attempt is cut short at the
    /// deadline.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::NoResponse` when the single attempt fails, or
    /// `HarnessError::NoResponseWithinTimeout` when the wait runs out.
    pub fn get_response(
        &self,
        url: &str,
        wait_for_connection: Option<Duration>,
    ) -> Result<HttpResponse, HarnessError> {
        let Some(wait) = wait_for_connection else {
            return self.client.get(url, None).map_err(|err| {
                tracing::debug!("{err}");
                HarnessError::NoResponse {
                    url: url.to_string(),
                }
            });
        };

        // A wait too large to represent as an instant has no deadline.
        let deadline = Instant::now().checked_add(wait);
        let mut backoff = self.settings.initial_backoff;
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            // No attempt may outlast the deadline.
            let attempt_timeout = deadline.map(|deadline| {
                deadline
                    .saturating_duration_since(Instant::now())
                    .min(self.settings.request_timeout)
            });
            match self.client.get(url, attempt_timeout) {
                Ok(response) => {
                    tracing::debug!("{url} responded after {attempts} attempt(s)");
                    return Ok(response);
                }
                Err(err) => tracing::debug!("attempt {attempts}: {err}"),
            }
            let delay = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    backoff.min(remaining)
                }
                None => backoff,
            };
            sleep(delay);
            backoff = backoff.saturating_mul(2).min(self.settings.max_backoff);
        }

        Err(HarnessError::NoResponseWithinTimeout {
            url: url.to_string(),
            wait,
        })
    }

    /// Gets responses from several URLs, one after another.
    ///
    /// # Errors
    ///
    /// Returns the first failure from [`Self::get_response`].
    pub fn get_responses(
        &self,
        checks: &[UrlCheck],
    ) -> Result<BTreeMap<String, HttpResponse>, HarnessError> {
        // TODO: query the URLs concurrently once the client is Send + Sync
        let mut responses = BTreeMap::new();
        for check in checks {
            let response = self.get_response(check.url(), check.wait())?;
            responses.insert(check.url().to_string(), response);
        }
        Ok(responses)
    }

    /// Compares a pre-migration response with the redeployed one.
    ///
    /// The original service must answer immediately. The redeployed service
    /// gets up to `wait_for_target` to start answering. All three checks are
    /// evaluated before anything is reported.
    ///
    /// # Errors
    ///
    /// Returns a no-response error if either service stays silent, or
    /// `HarnessError::Assertion` with every check if any of them failed.
    pub fn compare_redeployed_response(
        &self,
        original_ip: &str,
        redeployed_ip: &str,
        tcp_port: u16,
        expected_status: u16,
        wait_for_target: Duration,
    ) -> Result<ResponseComparison, HarnessError> {
        let original_url = service_url(original_ip, tcp_port);
        let original = self.get_response(&original_url, None)?;
        tracing::info!("Response received from {original_url}");

        let redeployed_url = service_url(redeployed_ip, tcp_port);
        let redeployed = self.get_response(&redeployed_url, Some(wait_for_target))?;
        tracing::info!("Response received from {redeployed_url}");

        let checks = evaluate_checks(vec![
            CheckOutcome::equal(ORIGINAL_STATUS, &expected_status, &original.status),
            CheckOutcome::equal(REDEPLOYED_STATUS, &original.status, &redeployed.status),
            CheckOutcome::equal(SAME_RESPONSE, &original.body, &redeployed.body),
        ])?;
        Ok(ResponseComparison {
            original,
            redeployed,
            checks,
        })
    }
}

impl std::fmt::Debug for ServicePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePoller")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
