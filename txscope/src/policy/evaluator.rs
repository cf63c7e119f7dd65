// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Commit-or-rollback decision for a failed transactional operation

use super::{ErrorCategory, TransactionPolicy};

/// Outcome chosen for the transaction after an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Commit,
    Rollback,
}

impl TransactionOutcome {
    pub fn decide(policy: &TransactionPolicy, category: &ErrorCategory) -> Self {
        if should_rollback(policy, category) {
            TransactionOutcome::Rollback
        } else {
            TransactionOutcome::Commit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionOutcome::Commit => "COMMIT",
            TransactionOutcome::Rollback => "ROLLBACK",
        }
    }
}

/// Decide whether an error of `category` must roll the transaction back
///
/// The error must match a `rollback_on` entry and no `ignore` entry; both
/// matches are category-or-supertype matches, so `ignore` always wins.
pub fn should_rollback(policy: &TransactionPolicy, category: &ErrorCategory) -> bool {
    let triggers = policy
        .rollback_on()
        .iter()
        .any(|rollback_on| category.is_a(rollback_on));
    if !triggers {
        return false;
    }

    !policy.ignore().iter().any(|ignore| category.is_a(ignore))
}
