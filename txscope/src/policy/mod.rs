// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rollback policies attached to call sites
//!
//! A [`TransactionPolicy`] decides, for an error escaping a transactional
//! operation, whether the surrounding transaction commits or rolls back.
//! Errors are matched through their [`ErrorCategory`], a static
//! single-inheritance tree rooted at [`ANY_ERROR`]:
//!
//! ```text
//! Error (ANY_ERROR)
//! ├── RuntimeError (RUNTIME_ERROR)
//! │   └── PersistenceError (PERSISTENCE_ERROR)
//! └── <application categories>
//! ```
//!
//! The default policy rolls back on [`RUNTIME_ERROR`] and everything below it,
//! ignores nothing and applies to every persistence unit.

pub mod evaluator;
pub mod resolver;

pub use evaluator::{should_rollback, TransactionOutcome};
pub use resolver::{AnnotatedPolicies, CallSite, PolicyCache, PolicyResolver};

use crate::unit::PersistenceUnitId;
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Node in the error category tree
///
/// Categories are compared by name, so every category in a process must
/// carry a distinct name.
#[derive(Debug)]
pub struct ErrorCategory {
    name: &'static str,
    parent: Option<&'static ErrorCategory>,
}

impl ErrorCategory {
    /// Create a category without a parent
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// Create a category below `parent`
    pub const fn new(name: &'static str, parent: &'static ErrorCategory) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static ErrorCategory> {
        self.parent
    }

    /// Category-or-supertype match: true if `self` is `other` or descends from it
    pub fn is_a(&self, other: &ErrorCategory) -> bool {
        let mut current = Some(self);
        while let Some(category) = current {
            if category.name == other.name {
                return true;
            }
            current = category.parent;
        }
        false
    }
}

impl PartialEq for ErrorCategory {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ErrorCategory {}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Root of the category tree; matches every error
pub static ANY_ERROR: ErrorCategory = ErrorCategory::root("Error");

/// Unchecked errors; the default rollback trigger
pub static RUNTIME_ERROR: ErrorCategory = ErrorCategory::new("RuntimeError", &ANY_ERROR);

/// Errors raised by the persistence machinery itself
pub static PERSISTENCE_ERROR: ErrorCategory =
    ErrorCategory::new("PersistenceError", &RUNTIME_ERROR);

/// Errors that can report their category to the rollback evaluator
pub trait Categorized {
    fn category(&self) -> &'static ErrorCategory;
}

/// Shared default policy used when no policy is resolved for a call site
pub static DEFAULT_POLICY: Lazy<Arc<TransactionPolicy>> =
    Lazy::new(|| Arc::new(TransactionPolicy::default()));

/// Declarative rollback configuration of a call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPolicy {
    rollback_on: Vec<&'static ErrorCategory>,
    ignore: Vec<&'static ErrorCategory>,
    units: BTreeSet<PersistenceUnitId>,
}

impl Default for TransactionPolicy {
    fn default() -> Self {
        Self {
            rollback_on: vec![&RUNTIME_ERROR],
            ignore: Vec::new(),
            units: BTreeSet::new(),
        }
    }
}

impl TransactionPolicy {
    pub fn builder() -> TransactionPolicyBuilder {
        TransactionPolicyBuilder::default()
    }

    /// Categories that trigger a rollback
    pub fn rollback_on(&self) -> &[&'static ErrorCategory] {
        &self.rollback_on
    }

    /// Categories carved out of `rollback_on`
    pub fn ignore(&self) -> &[&'static ErrorCategory] {
        &self.ignore
    }

    /// Units this policy is restricted to; empty means all units
    pub fn units(&self) -> &BTreeSet<PersistenceUnitId> {
        &self.units
    }

    /// Check whether the unit participates in transactions under this policy
    pub fn applies_to(&self, unit: &PersistenceUnitId) -> bool {
        self.units.is_empty() || self.units.contains(unit)
    }

    pub fn should_rollback(&self, category: &ErrorCategory) -> bool {
        evaluator::should_rollback(self, category)
    }
}

/// Builder for [`TransactionPolicy`]
///
/// Declaring any `rollback_on` category replaces the default
/// [`RUNTIME_ERROR`] trigger.
#[derive(Debug, Default)]
pub struct TransactionPolicyBuilder {
    rollback_on: Option<Vec<&'static ErrorCategory>>,
    ignore: Vec<&'static ErrorCategory>,
    units: BTreeSet<PersistenceUnitId>,
}

impl TransactionPolicyBuilder {
    pub fn rollback_on(mut self, category: &'static ErrorCategory) -> Self {
        self.rollback_on.get_or_insert_with(Vec::new).push(category);
        self
    }

    /// Never roll back, whatever the error
    pub fn rollback_on_nothing(mut self) -> Self {
        self.rollback_on = Some(Vec::new());
        self
    }

    pub fn ignore(mut self, category: &'static ErrorCategory) -> Self {
        self.ignore.push(category);
        self
    }

    /// Restrict the policy to the given unit; may be called repeatedly
    pub fn on_unit(mut self, unit: impl Into<PersistenceUnitId>) -> Self {
        self.units.insert(unit.into());
        self
    }

    pub fn build(self) -> TransactionPolicy {
        TransactionPolicy {
            rollback_on: self
                .rollback_on
                .unwrap_or_else(|| vec![&RUNTIME_ERROR]),
            ignore: self.ignore,
            units: self.units,
        }
    }
}
