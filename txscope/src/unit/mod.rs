// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistence units
//!
//! A persistence unit ties one session provider to its thread-scoped unit of
//! work and to the interceptor demarcating transactions on it. Units are
//! created by [`PersistenceModule`] and can be driven together through a
//! [`PersistenceUnitAggregate`].

pub mod aggregate;
pub mod module;

pub use aggregate::PersistenceUnitAggregate;
pub use module::PersistenceModule;

use crate::config::TransactionType;
use crate::error::PersistenceError;
use crate::interceptor::TransactionInterceptor;
use crate::policy::{CallSite, Categorized, TransactionPolicy};
use crate::session::{PersistenceService, SessionProvider, ThreadScopedUnitOfWork};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name identifying a persistence unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersistenceUnitId(String);

impl PersistenceUnitId {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PersistenceUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PersistenceUnitId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for PersistenceUnitId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A registered persistence unit
pub struct PersistenceUnit<P: SessionProvider> {
    id: PersistenceUnitId,
    transaction_type: TransactionType,
    provider: Arc<P>,
    unit_of_work: Arc<ThreadScopedUnitOfWork<P>>,
    interceptor: TransactionInterceptor<P>,
}

impl<P: SessionProvider> PersistenceUnit<P> {
    pub(crate) fn new(
        transaction_type: TransactionType,
        unit_of_work: Arc<ThreadScopedUnitOfWork<P>>,
        interceptor: TransactionInterceptor<P>,
    ) -> Self {
        Self {
            id: unit_of_work.unit().clone(),
            transaction_type,
            provider: unit_of_work.provider().clone(),
            unit_of_work,
            interceptor,
        }
    }

    pub fn id(&self) -> &PersistenceUnitId {
        &self.id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn unit_of_work(&self) -> &Arc<ThreadScopedUnitOfWork<P>> {
        &self.unit_of_work
    }

    pub fn interceptor(&self) -> &TransactionInterceptor<P> {
        &self.interceptor
    }

    /// Session bound to the calling thread
    ///
    /// # Returns
    /// * `Err(PersistenceError::NotActive)` - If no unit of work is running
    pub fn session(&self) -> Result<Arc<P::Session>, PersistenceError> {
        self.unit_of_work.get()
    }

    /// Run `op` in a transaction governed by the policy of `site`
    pub fn transactional<T, E, F>(&self, site: &CallSite, op: F) -> Result<T, E>
    where
        E: Categorized + From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.interceptor.around(site, op)
    }

    /// Run `op` in a transaction governed by `policy`
    pub fn transactional_with<T, E, F>(&self, policy: &TransactionPolicy, op: F) -> Result<T, E>
    where
        E: Categorized + From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.interceptor.around_with(policy, op)
    }
}

impl<P: SessionProvider> PersistenceService for PersistenceUnit<P> {
    fn start(&self) -> Result<(), PersistenceError> {
        self.provider.start()
    }

    fn stop(&self) -> Result<(), PersistenceError> {
        self.provider.stop()
    }

    fn is_running(&self) -> bool {
        self.provider.is_running()
    }
}

impl<P: SessionProvider> fmt::Debug for PersistenceUnit<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceUnit")
            .field("id", &self.id)
            .field("transaction_type", &self.transaction_type)
            .field("strategy", self.interceptor.strategy())
            .finish()
    }
}
