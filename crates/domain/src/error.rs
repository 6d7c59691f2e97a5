// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors raised while interpreting harness inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The machine listing printed by the CLI could not be interpreted.
    MalformedListing {
        /// Why the listing was rejected.
        reason: String,
    },
    /// A tag filter expression from the command line is unusable.
    InvalidTagExpression {
        /// The expression as given.
        expression: String,
        /// Why the expression was rejected.
        reason: String,
    },
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedListing { reason } => {
                write!(f, "Malformed machine listing: {reason}")
            }
            Self::InvalidTagExpression { expression, reason } => {
                write!(f, "Invalid tag expression '{expression}': {reason}")
            }
        }
    }
}

impl std::error::Error for DomainError {}
