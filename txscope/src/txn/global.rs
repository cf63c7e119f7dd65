// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Externally coordinated (global) transactions
//!
//! A [`UserTransaction`] is associated with the calling thread and spans the
//! sessions of every persistence unit enlisted in it. [`ThreadBoundCoordinator`]
//! is the in-process implementation; [`UserTransactionRegistry`] resolves a
//! configured name to a coordinator.

use crate::error::PersistenceError;
use crate::session::Session;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use uuid::Uuid;

/// Status of the global transaction associated with the calling thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction is associated with the thread
    NoTransaction,
    /// A transaction is running and may commit
    Active,
    /// A transaction is running but can only roll back
    MarkedRollback,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::NoTransaction => "NO_TRANSACTION",
            TransactionStatus::Active => "ACTIVE",
            TransactionStatus::MarkedRollback => "MARKED_ROLLBACK",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-associated global transaction
pub trait UserTransaction: Send + Sync {
    /// Start a transaction for the calling thread; nesting is not supported
    fn begin(&self) -> Result<(), PersistenceError>;

    /// Commit the calling thread's transaction and every enlisted session
    fn commit(&self) -> Result<(), PersistenceError>;

    /// Roll back the calling thread's transaction and every enlisted session
    fn rollback(&self) -> Result<(), PersistenceError>;

    /// Mark the calling thread's transaction so it can only roll back
    fn set_rollback_only(&self) -> Result<(), PersistenceError>;

    fn status(&self) -> TransactionStatus;

    /// Register a session with the calling thread's transaction
    ///
    /// Enlisting the same session twice has no further effect.
    fn enlist(&self, session: Arc<dyn Session>) -> Result<(), PersistenceError>;
}

struct GlobalTransactionState {
    id: Uuid,
    rollback_only: bool,
    sessions: Vec<Arc<dyn Session>>,
}

impl GlobalTransactionState {
    fn is_enlisted(&self, session: &Arc<dyn Session>) -> bool {
        self.sessions
            .iter()
            .any(|enlisted| same_session(enlisted, session))
    }
}

fn same_session(a: &Arc<dyn Session>, b: &Arc<dyn Session>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// In-process global transaction coordinator
///
/// Keeps one transaction per thread. Enlisted sessions are completed together,
/// in enlistment order.
///
/// Commit is not atomic across sessions. When a session fails to commit, the
/// sessions after it are rolled back, but the sessions before it stay
/// committed.
#[derive(Default)]
pub struct ThreadBoundCoordinator {
    transactions: RwLock<HashMap<ThreadId, GlobalTransactionState>>,
}

impl ThreadBoundCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the calling thread's transaction
    pub fn current_transaction_id(&self) -> Option<Uuid> {
        self.transactions
            .read()
            .get(&thread::current().id())
            .map(|state| state.id)
    }

    /// Number of sessions enlisted in the calling thread's transaction
    pub fn enlisted_sessions(&self) -> usize {
        self.transactions
            .read()
            .get(&thread::current().id())
            .map(|state| state.sessions.len())
            .unwrap_or(0)
    }

    fn take_current(&self) -> Result<GlobalTransactionState, PersistenceError> {
        self.transactions
            .write()
            .remove(&thread::current().id())
            .ok_or_else(no_transaction)
    }
}

fn no_transaction() -> PersistenceError {
    PersistenceError::Transaction(
        "No global transaction associated with the current thread".to_string(),
    )
}

/// Roll back every session, reporting the first failure
fn rollback_all(sessions: &[Arc<dyn Session>]) -> Result<(), PersistenceError> {
    let mut first_error = None;
    for session in sessions {
        if !session.is_transaction_active() {
            continue;
        }
        if let Err(e) = session.rollback_transaction() {
            log::error!("Failed to roll back session {}: {}", session.id(), e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

impl UserTransaction for ThreadBoundCoordinator {
    fn begin(&self) -> Result<(), PersistenceError> {
        let mut transactions = self.transactions.write();
        let thread_id = thread::current().id();
        if transactions.contains_key(&thread_id) {
            return Err(PersistenceError::Transaction(
                "Nested transactions are not supported by the user transaction".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        transactions.insert(
            thread_id,
            GlobalTransactionState {
                id,
                rollback_only: false,
                sessions: Vec::new(),
            },
        );
        log::info!("Began global transaction {}", id);
        Ok(())
    }

    fn commit(&self) -> Result<(), PersistenceError> {
        let state = self.take_current()?;

        if state.rollback_only {
            rollback_all(&state.sessions)?;
            log::info!("Rolled back global transaction {} (rollback-only)", state.id);
            return Err(PersistenceError::Transaction(format!(
                "Global transaction {} was marked rollback-only and has been rolled back",
                state.id
            )));
        }

        for (index, session) in state.sessions.iter().enumerate() {
            if let Err(e) = session.commit_transaction() {
                log::error!(
                    "Commit of session {} failed in global transaction {}: {}",
                    session.id(),
                    state.id,
                    e
                );
                // Sessions after the failing one have not been touched yet
                rollback_all(&state.sessions[index + 1..])?;
                return Err(PersistenceError::Transaction(format!(
                    "Global transaction {} failed during commit: {}",
                    state.id, e
                )));
            }
        }

        log::info!(
            "Committed global transaction {} across {} session(s)",
            state.id,
            state.sessions.len()
        );
        Ok(())
    }

    fn rollback(&self) -> Result<(), PersistenceError> {
        let state = self.take_current()?;
        rollback_all(&state.sessions)?;
        log::info!("Rolled back global transaction {}", state.id);
        Ok(())
    }

    fn set_rollback_only(&self) -> Result<(), PersistenceError> {
        let mut transactions = self.transactions.write();
        let state = transactions
            .get_mut(&thread::current().id())
            .ok_or_else(no_transaction)?;
        state.rollback_only = true;
        Ok(())
    }

    fn status(&self) -> TransactionStatus {
        match self.transactions.read().get(&thread::current().id()) {
            None => TransactionStatus::NoTransaction,
            Some(state) if state.rollback_only => TransactionStatus::MarkedRollback,
            Some(_) => TransactionStatus::Active,
        }
    }

    fn enlist(&self, session: Arc<dyn Session>) -> Result<(), PersistenceError> {
        let mut transactions = self.transactions.write();
        let state = transactions
            .get_mut(&thread::current().id())
            .ok_or_else(no_transaction)?;

        if state.is_enlisted(&session) {
            return Ok(());
        }

        session.join_transaction()?;
        log::debug!(
            "Enlisted session {} in global transaction {}",
            session.id(),
            state.id
        );
        state.sessions.push(session);
        Ok(())
    }
}

/// Name-based lookup of user transactions
#[derive(Default)]
pub struct UserTransactionRegistry {
    entries: RwLock<HashMap<String, Arc<dyn UserTransaction>>>,
}

impl UserTransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: impl Into<String>, transaction: Arc<dyn UserTransaction>) {
        self.entries.write().insert(name.into(), transaction);
    }

    pub fn unbind(&self, name: &str) -> Option<Arc<dyn UserTransaction>> {
        self.entries.write().remove(name)
    }

    /// Look up a user transaction by name
    ///
    /// # Returns
    /// * `Err(PersistenceError::PolicyViolation)` - If nothing is bound under `name`
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn UserTransaction>, PersistenceError> {
        self.entries.read().get(name).cloned().ok_or_else(|| {
            PersistenceError::PolicyViolation(format!(
                "Lookup for user transaction '{}' failed",
                name
            ))
        })
    }
}
