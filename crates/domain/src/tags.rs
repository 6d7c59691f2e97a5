// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Tag filters and the autoskip decision for features and scenarios.
//!
//! Groups tagged `@skip` are skipped unless the run explicitly asks for the
//! `skip` tag. The `--wip` flag replaces any `--tags` filter, so groups tagged
//! with both `@skip` *and* `@wip` also run when work in progress is requested.

use std::collections::BTreeSet;

use crate::DomainError;

/// Tag that marks a group as skipped by default.
pub const AUTOSKIP_TAG: &str = "skip";

/// Tag that marks a group as work in progress.
pub const WIP_TAG: &str = "wip";

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagTerm {
    tag: String,
    negated: bool,
}

impl TagTerm {
    fn matches(&self, tags: &BTreeSet<&str>) -> bool {
        tags.contains(self.tag.as_str()) != self.negated
    }
}

/// The active tag filter for a run.
///
/// Each command-line expression is one clause. Comma separated terms inside a
/// clause are alternatives, and every clause must hold. A term prefixed with
/// `~` or `-` matches when the tag is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    clauses: Vec<Vec<TagTerm>>,
}

impl TagFilter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Builds the filter from `--tags` expressions and the `--wip` flag.
    ///
    /// When `wip` is set the expressions are ignored and the filter becomes
    /// the single clause `wip`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTagExpression` if a term has no tag name.
    pub fn parse<S: AsRef<str>>(expressions: &[S], wip: bool) -> Result<Self, DomainError> {
        if wip {
            return Ok(Self {
                clauses: vec![vec![TagTerm {
                    tag: WIP_TAG.to_string(),
                    negated: false,
                }]],
            });
        }

        let mut clauses = Vec::new();
        for expression in expressions {
            let expression = expression.as_ref().trim();
            if expression.is_empty() {
                continue;
            }
            let mut clause = Vec::new();
            for raw_term in expression.split(',') {
                clause.push(parse_term(expression, raw_term)?);
            }
            clauses.push(clause);
        }
        Ok(Self { clauses })
    }

    /// Returns true when no filter was requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Checks whether a set of tags satisfies the filter.
    ///
    /// An empty filter accepts any tag set.
    #[must_use]
    pub fn check<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let tags: BTreeSet<&str> = tags.into_iter().collect();
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|term| term.matches(&tags)))
    }
}

fn parse_term(expression: &str, raw_term: &str) -> Result<TagTerm, DomainError> {
    let term = raw_term.trim();
    let (negated, rest) = match term.strip_prefix('~').or_else(|| term.strip_prefix('-')) {
        Some(rest) => (true, rest),
        None => (false, term),
    };
    let tag = rest.strip_prefix('@').unwrap_or(rest).trim();
    if tag.is_empty() {
        return Err(DomainError::InvalidTagExpression {
            expression: expression.to_string(),
            reason: format!("term '{raw_term}' has no tag name"),
        });
    }
    Ok(TagTerm {
        tag: tag.to_string(),
        negated,
    })
}

/// A feature or scenario together with the tags attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGroup {
    name: String,
    tags: BTreeSet<String>,
}

impl TestGroup {
    /// Creates a group. Leading `@` markers on tags are dropped.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|tag| {
                let tag = tag.as_ref().trim();
                tag.strip_prefix('@').unwrap_or(tag).to_string()
            })
            .filter(|tag| !tag.is_empty())
            .collect();
        Self {
            name: name.into(),
            tags,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Decides whether a test group should be skipped under the active filter.
///
/// A group is skipped when it carries `@skip` and the run neither asked for
/// the `skip` tag nor asked for `skip`+`wip` on a group that is also `@wip`.
#[must_use]
pub fn should_skip(group: &TestGroup, filter: &TagFilter) -> bool {
    let autoskip_tag_set = group.has_tag(AUTOSKIP_TAG);
    let autoskip_requested = !filter.is_empty() && filter.check([AUTOSKIP_TAG]);
    let wip_tag_set = group.has_tag(WIP_TAG);
    let wip_requested = !filter.is_empty() && filter.check([AUTOSKIP_TAG, WIP_TAG]);
    let override_autoskip = autoskip_requested || (wip_tag_set && wip_requested);
    autoskip_tag_set && !override_autoskip
}
