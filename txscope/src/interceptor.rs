// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction interceptor
//!
//! Wraps an operation in a transaction on one persistence unit. The
//! interceptor starts the unit of work when none is running, acquires a
//! facade for the bound session, and completes the transaction according to
//! the operation's outcome and the call-site policy. The operation's error is
//! always handed back unchanged.

use crate::error::PersistenceError;
use crate::policy::{CallSite, Categorized, PolicyCache, TransactionOutcome, TransactionPolicy};
use crate::session::unit_of_work::EndOnUnwind;
use crate::session::{Session, SessionProvider, ThreadScopedUnitOfWork, UnitOfWork};
use crate::txn::{TransactionFacade, TransactionStrategy};
use crate::unit::PersistenceUnitId;
use std::sync::Arc;

/// Demarcates transactions around operations on one persistence unit
pub struct TransactionInterceptor<P: SessionProvider> {
    unit: PersistenceUnitId,
    unit_of_work: Arc<ThreadScopedUnitOfWork<P>>,
    strategy: TransactionStrategy,
    policies: Arc<PolicyCache>,
}

impl<P: SessionProvider> TransactionInterceptor<P> {
    pub fn new(
        unit_of_work: Arc<ThreadScopedUnitOfWork<P>>,
        strategy: TransactionStrategy,
        policies: Arc<PolicyCache>,
    ) -> Self {
        Self {
            unit: unit_of_work.unit().clone(),
            unit_of_work,
            strategy,
            policies,
        }
    }

    pub fn unit(&self) -> &PersistenceUnitId {
        &self.unit
    }

    pub fn strategy(&self) -> &TransactionStrategy {
        &self.strategy
    }

    pub fn policies(&self) -> &Arc<PolicyCache> {
        &self.policies
    }

    /// Run `op` under the policy resolved for `site`
    pub fn around<T, E, F>(&self, site: &CallSite, op: F) -> Result<T, E>
    where
        E: Categorized + From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        let policy = self.policies.policy_for(site);
        log::debug!("INTERCEPTOR: {} on unit '{}'", site, self.unit);
        self.around_with(&policy, op)
    }

    /// Run `op` under an explicit policy
    ///
    /// # Returns
    /// * `Ok(value)` - The operation succeeded and its transaction completed
    /// * `Err(error)` - The operation's own error, or a structural
    ///   [`PersistenceError`] converted into `E`
    pub fn around_with<T, E, F>(&self, policy: &TransactionPolicy, op: F) -> Result<T, E>
    where
        E: Categorized + From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        if !policy.applies_to(&self.unit) {
            log::debug!(
                "INTERCEPTOR: Policy does not cover unit '{}' - passing through",
                self.unit
            );
            return op();
        }

        let started = !self.unit_of_work.is_active();
        if started {
            self.unit_of_work.begin()?;
        }

        let mut guard = EndOnUnwind::new(self.unit_of_work.as_ref(), started);
        let result = self.run_in_transaction(policy, op);
        guard.disarm();

        if started {
            if let Err(e) = self.unit_of_work.end() {
                if result.is_ok() {
                    return Err(e.into());
                }
                log::error!(
                    "INTERCEPTOR: Failed to end unit of work on '{}': {}",
                    self.unit,
                    e
                );
            }
        }

        result
    }

    fn run_in_transaction<T, E, F>(&self, policy: &TransactionPolicy, op: F) -> Result<T, E>
    where
        E: Categorized + From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        let session = self.unit_of_work.get()?;
        let facade = self.strategy.facade_for(session);
        log::debug!(
            "INTERCEPTOR: Acquired {} facade on unit '{}'",
            facade.role(),
            self.unit
        );

        facade.begin()?;
        if facade.is_outer() {
            log::info!("Began transaction on unit '{}'", self.unit);
        }

        let mut guard = RollbackOnUnwind {
            facade: &facade,
            armed: true,
        };
        let outcome = op();
        guard.armed = false;

        match outcome {
            Ok(value) => {
                facade.commit()?;
                if facade.is_outer() {
                    log::info!("Committed transaction on unit '{}'", self.unit);
                }
                Ok(value)
            }
            Err(error) => {
                let category = error.category();
                let outcome = TransactionOutcome::decide(policy, category);
                let completion = match outcome {
                    TransactionOutcome::Rollback => facade.rollback(),
                    TransactionOutcome::Commit => facade.commit(),
                };

                match completion {
                    Ok(()) if facade.is_outer() => log::info!(
                        "Completed transaction on unit '{}' with {} after {}",
                        self.unit,
                        outcome.as_str(),
                        category
                    ),
                    Ok(()) if outcome == TransactionOutcome::Rollback => log::info!(
                        "Marked transaction on unit '{}' rollback-only after {}",
                        self.unit,
                        category
                    ),
                    Ok(()) => {}
                    Err(e) => log::error!(
                        "Failed to {} transaction on unit '{}' after {}: {}",
                        outcome.as_str(),
                        self.unit,
                        category,
                        e
                    ),
                }

                Err(error)
            }
        }
    }
}

/// Rolls back (outer) or marks rollback-only (inner) if the operation panics
struct RollbackOnUnwind<'a, S: Session + 'static> {
    facade: &'a TransactionFacade<S>,
    armed: bool,
}

impl<S: Session + 'static> Drop for RollbackOnUnwind<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!(
            "INTERCEPTOR: Operation panicked - rolling back {} transaction",
            self.facade.role()
        );
        if let Err(e) = self.facade.rollback() {
            log::error!("INTERCEPTOR: Failed to roll back after panic: {}", e);
        }
    }
}
