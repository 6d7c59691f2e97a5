// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Details of the local hosts involved in a migration command.

use serde::Deserialize;

use crate::DomainError;

/// One machine as reported by `list-machines --shallow`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MachineEntry {
    /// The machine's hostname.
    pub hostname: String,
    /// Host-reachable addresses, most preferred first.
    pub ip: Vec<String>,
}

/// The JSON payload printed by `list-machines --shallow`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MachineListing {
    /// Every local machine the CLI found.
    pub machines: Vec<MachineEntry>,
}

impl MachineListing {
    /// Parses the CLI's listing output.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedListing` if the text is not JSON or
    /// lacks the `machines` array.
    pub fn parse(json: &str) -> Result<Self, DomainError> {
        serde_json::from_str(json).map_err(|err| DomainError::MalformedListing {
            reason: err.to_string(),
        })
    }
}

/// Result of a single migration command, derived from the machine listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    /// Total number of local VMs found during migration.
    pub local_vm_count: usize,
    /// Host accessible address of the source VM, if listed.
    pub source_ip: Option<String>,
    /// Host accessible address of the target VM, if listed.
    pub target_ip: Option<String>,
}

impl MigrationInfo {
    /// Builds the result from a machine listing and the two migration hostnames.
    ///
    /// Hosts missing from the listing, or listed without any address, are
    /// reported as `None`.
    #[must_use]
    pub fn from_vm_list(machines: &[MachineEntry], source_host: &str, target_host: &str) -> Self {
        let mut source_ip: Option<String> = None;
        let mut target_ip: Option<String> = None;
        for machine in machines {
            let first_ip = machine.ip.first();
            if machine.hostname == source_host
                && let Some(ip) = first_ip
            {
                source_ip = Some(ip.clone());
            }
            if machine.hostname == target_host
                && let Some(ip) = first_ip
            {
                target_ip = Some(ip.clone());
            }
            if source_ip.is_some() && target_ip.is_some() {
                break;
            }
        }
        Self {
            local_vm_count: machines.len(),
            source_ip,
            target_ip,
        }
    }

    /// Parses raw listing output and derives the migration details from it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedListing` if the output cannot be parsed.
    pub fn from_listing_json(
        json: &str,
        source_host: &str,
        target_host: &str,
    ) -> Result<Self, DomainError> {
        let listing = MachineListing::parse(json)?;
        Ok(Self::from_vm_list(
            &listing.machines,
            source_host,
            target_host,
        ))
    }
}
