// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Uniform begin/commit/rollback over local and global transactions
//!
//! The interceptor never talks to a session or a user transaction directly.
//! It asks the unit's [`TransactionStrategy`] for a [`TransactionFacade`]
//! bound to the current session, and the facade decides, from whether a
//! transaction was already running, if this call owns the transaction
//! ([`TransactionRole::Outer`]) or only participates in it
//! ([`TransactionRole::Inner`]).

use super::global::{TransactionStatus, UserTransaction};
use crate::error::PersistenceError;
use crate::session::Session;
use std::fmt;
use std::sync::Arc;

/// Ownership of the transaction a facade operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRole {
    /// Started the transaction and completes it
    Outer,
    /// Joined a running transaction; can only mark it rollback-only
    Inner,
}

impl TransactionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionRole::Outer => "outer",
            TransactionRole::Inner => "inner",
        }
    }
}

impl fmt::Display for TransactionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction mode of a persistence unit, fixed when the unit is configured
#[derive(Clone)]
pub enum TransactionStrategy {
    /// Physical transactions on the unit's own session
    Local,
    /// Externally coordinated transactions spanning several units
    Global(Arc<dyn UserTransaction>),
}

impl TransactionStrategy {
    pub fn is_global(&self) -> bool {
        matches!(self, TransactionStrategy::Global(_))
    }

    /// Build the facade for one intercepted call on `session`
    pub fn facade_for<S: Session + 'static>(&self, session: Arc<S>) -> TransactionFacade<S> {
        match self {
            TransactionStrategy::Local => {
                let role = if session.is_transaction_active() {
                    TransactionRole::Inner
                } else {
                    TransactionRole::Outer
                };
                TransactionFacade::Local { role, session }
            }
            TransactionStrategy::Global(transaction) => {
                let role = if transaction.status() == TransactionStatus::NoTransaction {
                    TransactionRole::Outer
                } else {
                    TransactionRole::Inner
                };
                TransactionFacade::Global {
                    role,
                    transaction: transaction.clone(),
                    session,
                }
            }
        }
    }
}

impl fmt::Debug for TransactionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStrategy::Local => f.write_str("Local"),
            TransactionStrategy::Global(transaction) => {
                write!(f, "Global({})", transaction.status())
            }
        }
    }
}

/// Begin/commit/rollback for one intercepted call
pub enum TransactionFacade<S: Session + 'static> {
    Local {
        role: TransactionRole,
        session: Arc<S>,
    },
    Global {
        role: TransactionRole,
        transaction: Arc<dyn UserTransaction>,
        session: Arc<S>,
    },
}

impl<S: Session + 'static> TransactionFacade<S> {
    pub fn role(&self) -> TransactionRole {
        match self {
            TransactionFacade::Local { role, .. } => *role,
            TransactionFacade::Global { role, .. } => *role,
        }
    }

    pub fn is_outer(&self) -> bool {
        self.role() == TransactionRole::Outer
    }

    pub fn begin(&self) -> Result<(), PersistenceError> {
        match self {
            TransactionFacade::Local { role, session } => match role {
                TransactionRole::Outer => session.begin_transaction(),
                TransactionRole::Inner => Ok(()),
            },
            TransactionFacade::Global {
                role,
                transaction,
                session,
            } => {
                if *role == TransactionRole::Inner {
                    return transaction.enlist(session.clone());
                }

                transaction.begin()?;
                if let Err(e) = transaction.enlist(session.clone()) {
                    if let Err(rollback_error) = transaction.rollback() {
                        log::error!(
                            "Failed to roll back global transaction after enlist failure: {}",
                            rollback_error
                        );
                    }
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    pub fn commit(&self) -> Result<(), PersistenceError> {
        match self {
            TransactionFacade::Local { role, session } => match role {
                TransactionRole::Outer if session.is_rollback_only() => {
                    log::debug!(
                        "Session {} marked rollback-only - rolling back instead of commit",
                        session.id()
                    );
                    session.rollback_transaction()
                }
                TransactionRole::Outer => session.commit_transaction(),
                TransactionRole::Inner => Ok(()),
            },
            TransactionFacade::Global {
                role, transaction, ..
            } => match role {
                TransactionRole::Outer if transaction.status() == TransactionStatus::Active => {
                    transaction.commit()
                }
                TransactionRole::Outer => transaction.rollback(),
                TransactionRole::Inner => Ok(()),
            },
        }
    }

    pub fn rollback(&self) -> Result<(), PersistenceError> {
        match self {
            TransactionFacade::Local { role, session } => match role {
                TransactionRole::Outer => session.rollback_transaction(),
                TransactionRole::Inner => session.set_rollback_only(),
            },
            TransactionFacade::Global {
                role, transaction, ..
            } => match role {
                TransactionRole::Outer => transaction.rollback(),
                TransactionRole::Inner => transaction.set_rollback_only(),
            },
        }
    }
}

impl<S: Session + 'static> fmt::Debug for TransactionFacade<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, role) = match self {
            TransactionFacade::Local { role, .. } => ("Local", role),
            TransactionFacade::Global { role, .. } => ("Global", role),
        };
        f.debug_struct("TransactionFacade")
            .field("kind", &kind)
            .field("role", role)
            .finish()
    }
}
