// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Registration of persistence units

use super::{PersistenceUnit, PersistenceUnitAggregate, PersistenceUnitId};
use crate::config::{PersistenceConfig, PersistenceUnitConfig, TransactionType};
use crate::error::PersistenceError;
use crate::filter::PersistenceFilter;
use crate::interceptor::TransactionInterceptor;
use crate::policy::PolicyCache;
use crate::session::{SessionProvider, ThreadScopedUnitOfWork};
use crate::txn::{TransactionStrategy, UserTransactionRegistry};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Wires persistence units and registers them with a shared aggregate
///
/// Every unit gets its own unit of work, transaction strategy and
/// interceptor. All interceptors share one policy cache.
pub struct PersistenceModule {
    registry: Arc<UserTransactionRegistry>,
    user_transaction_name: Option<String>,
    policies: Arc<PolicyCache>,
    aggregate: Arc<PersistenceUnitAggregate>,
    names: RwLock<BTreeSet<PersistenceUnitId>>,
}

impl PersistenceModule {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(UserTransactionRegistry::new()),
            user_transaction_name: None,
            policies: Arc::new(PolicyCache::with_defaults()),
            aggregate: Arc::new(PersistenceUnitAggregate::new()),
            names: RwLock::new(BTreeSet::new()),
        }
    }

    /// Module taking its user transaction name from `config`
    pub fn from_config(config: &PersistenceConfig, registry: Arc<UserTransactionRegistry>) -> Self {
        let module = Self::new().with_registry(registry);
        match &config.user_transaction_name {
            Some(name) => module.with_user_transaction_name(name.clone()),
            None => module,
        }
    }

    pub fn with_registry(mut self, registry: Arc<UserTransactionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registry name of the user transaction used by JTA units
    pub fn with_user_transaction_name(mut self, name: impl Into<String>) -> Self {
        self.user_transaction_name = Some(name.into());
        self
    }

    pub fn with_policies(mut self, policies: Arc<PolicyCache>) -> Self {
        self.policies = policies;
        self
    }

    pub fn policies(&self) -> &Arc<PolicyCache> {
        &self.policies
    }

    pub fn aggregate(&self) -> &Arc<PersistenceUnitAggregate> {
        &self.aggregate
    }

    pub fn unit_ids(&self) -> Vec<PersistenceUnitId> {
        self.aggregate.unit_ids()
    }

    /// Register a persistence unit backed by `provider`
    ///
    /// # Returns
    /// * `Ok(unit)` - The wired unit, also registered with the aggregate
    /// * `Err(PersistenceError::Configuration)` - If a unit with the same name exists
    /// * `Err(PersistenceError::PolicyViolation)` - If a JTA unit has no resolvable user transaction
    pub fn add_unit<P>(
        &self,
        config: &PersistenceUnitConfig,
        provider: Arc<P>,
    ) -> Result<Arc<PersistenceUnit<P>>, PersistenceError>
    where
        P: SessionProvider + 'static,
    {
        let id = PersistenceUnitId::new(&config.name);
        let mut names = self.names.write();
        if names.contains(&id) {
            return Err(PersistenceError::Configuration(format!(
                "Persistence unit '{}' is already registered",
                id
            )));
        }

        let strategy = self.strategy_for(config.transaction_type)?;
        let unit_of_work = Arc::new(ThreadScopedUnitOfWork::new(id.clone(), provider));
        let interceptor =
            TransactionInterceptor::new(unit_of_work.clone(), strategy, self.policies.clone());
        let unit = Arc::new(PersistenceUnit::new(
            config.transaction_type,
            unit_of_work.clone(),
            interceptor,
        ));

        self.aggregate.add(id.clone(), unit.clone(), unit_of_work);
        log::info!(
            "Registered persistence unit '{}' ({:?})",
            id,
            config.transaction_type
        );
        names.insert(id);
        Ok(unit)
    }

    fn strategy_for(
        &self,
        transaction_type: TransactionType,
    ) -> Result<TransactionStrategy, PersistenceError> {
        match transaction_type {
            TransactionType::ResourceLocal => Ok(TransactionStrategy::Local),
            TransactionType::Jta => {
                let name = self.user_transaction_name.as_deref().ok_or_else(|| {
                    PersistenceError::PolicyViolation(
                        "JTA persistence unit requires a user transaction name".to_string(),
                    )
                })?;
                Ok(TransactionStrategy::Global(self.registry.lookup(name)?))
            }
        }
    }

    /// Request filter driving every registered unit
    ///
    /// # Returns
    /// * `Err(PersistenceError::Configuration)` - If no unit is registered
    pub fn filter(&self) -> Result<PersistenceFilter, PersistenceError> {
        if self.aggregate.is_empty() {
            return Err(PersistenceError::Configuration(
                "No persistence unit registered".to_string(),
            ));
        }
        Ok(PersistenceFilter::new(self.aggregate.clone()))
    }
}

impl Default for PersistenceModule {
    fn default() -> Self {
        Self::new()
    }
}
