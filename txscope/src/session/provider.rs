// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session provider abstraction for persistence backends
//!
//! This module provides the trait-based seams between the transaction
//! machinery and a concrete backend (see `crate::memory` for the in-process
//! implementation).

use crate::error::PersistenceError;
use std::sync::Arc;

/// Start/stop lifecycle of a persistence backend
pub trait PersistenceService: Send + Sync {
    /// Start the service
    ///
    /// # Returns
    /// * `Ok(())` - Service started
    /// * `Err(PersistenceError::AlreadyRunning)` - If the service was already running
    fn start(&self) -> Result<(), PersistenceError>;

    /// Stop the service; stopping a stopped service does nothing
    fn stop(&self) -> Result<(), PersistenceError>;

    /// Check whether the service is running
    fn is_running(&self) -> bool;
}

/// A backend session
///
/// A session owns at most one physical transaction at a time. All methods take
/// `&self`; implementations synchronise internally because sessions are handed
/// out as `Arc`s.
pub trait Session: Send + Sync {
    /// Session identifier, used for logging
    fn id(&self) -> String;

    /// Start the physical transaction
    fn begin_transaction(&self) -> Result<(), PersistenceError>;

    /// Commit the physical transaction
    fn commit_transaction(&self) -> Result<(), PersistenceError>;

    /// Roll the physical transaction back
    fn rollback_transaction(&self) -> Result<(), PersistenceError>;

    /// Check whether a physical transaction is running on this session
    fn is_transaction_active(&self) -> bool;

    /// Mark the running physical transaction so it can only roll back
    fn set_rollback_only(&self) -> Result<(), PersistenceError>;

    /// Check the rollback-only mark of the running physical transaction
    fn is_rollback_only(&self) -> bool;

    /// Attach this session to an externally coordinated transaction
    ///
    /// Starts the physical transaction if none is running. After joining, the
    /// coordinator owns completion: closing the session must not roll it back.
    fn join_transaction(&self) -> Result<(), PersistenceError>;
}

/// Opens and closes sessions for one persistence unit
pub trait SessionProvider: PersistenceService {
    type Session: Session + 'static;

    /// Open a new session
    ///
    /// # Returns
    /// * `Ok(session)` - A freshly opened session
    /// * `Err(PersistenceError::NotRunning)` - If the provider is stopped
    fn open(&self) -> Result<Arc<Self::Session>, PersistenceError>;

    /// Close a session previously returned by [`open`](Self::open)
    fn close(&self, session: Arc<Self::Session>) -> Result<(), PersistenceError>;
}
