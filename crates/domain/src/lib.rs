// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

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

mod error;
mod migration;
mod tags;

#[cfg(test)]
mod tests;

pub use error::DomainError;
pub use migration::{MachineEntry, MachineListing, MigrationInfo};
pub use tags::{AUTOSKIP_TAG, TagFilter, TestGroup, WIP_TAG, should_skip};
