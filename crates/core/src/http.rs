// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Plain HTTP GET used to observe services on the test VMs.

use std::time::Duration;

use crate::HarnessError;

/// Status code and text body of a service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single GET request.
pub trait HttpClient {
    /// Sends one request. `timeout` shortens the client's own request
    /// timeout for this attempt.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Http` if no response was received.
    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse, HarnessError>;
}

/// Blocking `reqwest` client with per-request connect and read timeouts.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// # Errors
    ///
    /// Returns `HarnessError::HttpClient` if the TLS backend cannot be initialised.
    pub fn new(request_timeout: Duration) -> Result<Self, HarnessError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(request_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| HarnessError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Option<Duration>) -> Result<HttpResponse, HarnessError> {
        let http_error = |err: reqwest::Error| HarnessError::Http {
            url: url.to_string(),
            reason: err.to_string(),
        };
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().map_err(http_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(http_error)?;
        Ok(HttpResponse { status, body })
    }
}

/// Formats the service URL for an address and port, bracketing IPv6 literals.
#[must_use]
pub fn service_url(ip: &str, tcp_port: u16) -> String {
    if ip.contains(':') && !ip.starts_with('[') {
        format!("http://[{ip}]:{tcp_port}/")
    } else {
        format!("http://{ip}:{tcp_port}/")
    }
}
