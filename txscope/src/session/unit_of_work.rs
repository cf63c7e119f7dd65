// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Thread-scoped unit of work
//!
//! A unit of work binds exactly one session to the calling thread for one
//! persistence unit. Sessions are registered in a map keyed by thread id, the
//! same registry layout the session manager uses for session ids.

use crate::error::PersistenceError;
use crate::session::provider::{Session, SessionProvider};
use crate::unit::PersistenceUnitId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Lifecycle of a unit of work for the calling thread
pub trait UnitOfWork: Send + Sync {
    /// Start the unit of work
    ///
    /// # Returns
    /// * `Err(PersistenceError::AlreadyActive)` - If it is already running for this thread
    fn begin(&self) -> Result<(), PersistenceError>;

    /// Check whether the unit of work is running for this thread
    fn is_active(&self) -> bool;

    /// End the unit of work; ending an inactive unit of work does nothing
    fn end(&self) -> Result<(), PersistenceError>;
}

/// Unit of work keeping one session per thread
pub struct ThreadScopedUnitOfWork<P: SessionProvider> {
    unit: PersistenceUnitId,
    provider: Arc<P>,
    /// Registry of bound sessions indexed by owning thread
    sessions: RwLock<HashMap<ThreadId, Arc<P::Session>>>,
}

impl<P: SessionProvider> ThreadScopedUnitOfWork<P> {
    pub fn new(unit: PersistenceUnitId, provider: Arc<P>) -> Self {
        Self {
            unit,
            provider,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn unit(&self) -> &PersistenceUnitId {
        &self.unit
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Get the session bound to the calling thread
    ///
    /// The returned handle is only meaningful until the unit of work ends;
    /// callers must not keep it across invocations.
    pub fn get(&self) -> Result<Arc<P::Session>, PersistenceError> {
        self.sessions
            .read()
            .get(&thread::current().id())
            .cloned()
            .ok_or(PersistenceError::NotActive)
    }

    /// Number of threads currently holding a session
    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

impl<P: SessionProvider> UnitOfWork for ThreadScopedUnitOfWork<P> {
    fn begin(&self) -> Result<(), PersistenceError> {
        // Only the calling thread ever inserts under its own id, so the
        // check-then-insert below cannot race.
        if self.is_active() {
            return Err(PersistenceError::AlreadyActive);
        }

        let session = self.provider.open()?;
        log::debug!(
            "UNIT_OF_WORK: Began on unit '{}' with session {}",
            self.unit,
            session.id()
        );
        self.sessions.write().insert(thread::current().id(), session);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.sessions.read().contains_key(&thread::current().id())
    }

    fn end(&self) -> Result<(), PersistenceError> {
        let session = self.sessions.write().remove(&thread::current().id());
        match session {
            Some(session) => {
                log::debug!("UNIT_OF_WORK: Ending on unit '{}'", self.unit);
                self.provider.close(session)
            }
            None => Ok(()),
        }
    }
}

/// Ends a unit of work if the enclosing call unwinds before disarming
pub(crate) struct EndOnUnwind<'a, U: UnitOfWork + ?Sized> {
    unit_of_work: &'a U,
    armed: bool,
}

impl<'a, U: UnitOfWork + ?Sized> EndOnUnwind<'a, U> {
    pub(crate) fn new(unit_of_work: &'a U, armed: bool) -> Self {
        Self {
            unit_of_work,
            armed,
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<U: UnitOfWork + ?Sized> Drop for EndOnUnwind<'_, U> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::warn!("UNIT_OF_WORK: Ending after panic");
        if let Err(e) = self.unit_of_work.end() {
            log::error!("UNIT_OF_WORK: Failed to end after panic: {}", e);
        }
    }
}
