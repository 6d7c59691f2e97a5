// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Deferred cleanup actions with a nested lifetime.
//!
//! A run owns three scopes at once: suite, feature and scenario. Each one
//! unwinds its actions in reverse registration order when closed, and again
//! on drop for anything still pending.

use crate::HarnessError;
use crate::error::CleanupErrors;

type CleanupAction = Box<dyn FnOnce() -> Result<(), HarnessError>>;

/// A LIFO stack of cleanup actions.
pub struct ResourceScope {
    label: String,
    actions: Vec<CleanupAction>,
}

impl ResourceScope {
    /// Creates an empty scope. The label only appears in logs and errors.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Defers `action` until the scope is closed.
    pub fn register<F>(&mut self, action: F)
    where
        F: FnOnce() -> Result<(), HarnessError> + 'static,
    {
        self.actions.push(Box::new(action));
    }

    /// Number of actions still waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every pending action, newest first.
    ///
    /// A failing action does not stop the ones registered before it. Each
    /// action runs at most once, so closing an already closed scope is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cleanup` listing every action that failed.
    pub fn close(&mut self) -> Result<(), HarnessError> {
        if self.actions.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            "closing {} scope ({} pending action(s))",
            self.label,
            self.actions.len()
        );

        let mut errors = Vec::new();
        while let Some(action) = self.actions.pop() {
            if let Err(err) = action() {
                tracing::warn!("cleanup action in {} scope failed: {err}", self.label);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Cleanup(CleanupErrors {
                scope: self.label.clone(),
                errors,
            }))
        }
    }
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceScope")
            .field("label", &self.label)
            .field("pending", &self.actions.len())
            .finish()
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::error!("{err}");
        }
    }
}
