// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! txscope - Transaction demarcation for persistence backends
//!
//! txscope binds sessions to threads for the duration of a unit of work and
//! wraps operations in transactions, so that nested transactional calls
//! collapse onto a single physical transaction.
//!
//! # Features
//!
//! - **Unit of Work**: One session per thread and persistence unit
//! - **Nested Transactions**: Only the outermost call commits or rolls back;
//!   inner calls can only mark the transaction rollback-only
//! - **Rollback Policies**: Commit-or-rollback decided from error categories,
//!   with `ignore` carving exceptions out of `rollback_on`
//! - **Multiple Units**: Local transactions per unit, or one global
//!   transaction spanning several units
//! - **In-Memory Backend**: A transactional key/value backend for embedded use
//!   and tests
//!
//! # Usage
//!
//! ```ignore
//! let module = PersistenceModule::new();
//! let config = PersistenceUnitConfig::new("orders");
//! let orders = module.add_unit(&config, Arc::new(MemorySessionFactory::from_config(&config)))?;
//! orders.start()?;
//!
//! orders.transactional(&CallSite::new("OrderService", "place"), || {
//!     orders.session()?.persist("order:1", &order)?;
//!     Ok::<_, AppError>(())
//! })?;
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod memory;
pub mod policy;
pub mod session;
pub mod txn;
pub mod unit;

pub use config::{PersistenceConfig, PersistenceUnitConfig, TransactionType};
pub use error::PersistenceError;
pub use filter::PersistenceFilter;
pub use interceptor::TransactionInterceptor;
pub use memory::{MemoryDatabase, MemorySession, MemorySessionFactory};
pub use policy::{
    should_rollback, AnnotatedPolicies, CallSite, Categorized, ErrorCategory, PolicyCache,
    PolicyResolver, TransactionOutcome, TransactionPolicy, TransactionPolicyBuilder, ANY_ERROR,
    PERSISTENCE_ERROR, RUNTIME_ERROR,
};
pub use session::{
    PersistenceService, Session, SessionProvider, ThreadScopedUnitOfWork, UnitOfWork,
};
pub use txn::{
    ThreadBoundCoordinator, TransactionFacade, TransactionRole, TransactionStatus,
    TransactionStrategy, UserTransaction, UserTransactionRegistry,
};
pub use unit::{PersistenceModule, PersistenceUnit, PersistenceUnitAggregate, PersistenceUnitId};

/// txscope version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// txscope crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
