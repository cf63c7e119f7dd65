// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Application-managed session factory for the in-memory backend

use super::database::MemoryDatabase;
use super::session::MemorySession;
use crate::config::PersistenceUnitConfig;
use crate::error::PersistenceError;
use crate::session::{PersistenceService, SessionProvider};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Session factory owning one [`MemoryDatabase`] while running
///
/// Starting creates a fresh database; stopping drops it. Sessions opened by
/// the factory inherit its properties.
pub struct MemorySessionFactory {
    name: String,
    properties: BTreeMap<String, String>,
    database: RwLock<Option<Arc<MemoryDatabase>>>,
    open_sessions: AtomicUsize,
}

impl MemorySessionFactory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            database: RwLock::new(None),
            open_sessions: AtomicUsize::new(0),
        }
    }

    /// Factory named and configured after a persistence unit
    pub fn from_config(config: &PersistenceUnitConfig) -> Self {
        Self::new(config.name.clone()).with_properties(config.properties.clone())
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Database of the running factory
    pub fn database(&self) -> Result<Arc<MemoryDatabase>, PersistenceError> {
        self.database
            .read()
            .clone()
            .ok_or_else(|| PersistenceError::NotRunning(self.name.clone()))
    }

    /// Number of sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl PersistenceService for MemorySessionFactory {
    fn start(&self) -> Result<(), PersistenceError> {
        let mut database = self.database.write();
        if database.is_some() {
            return Err(PersistenceError::AlreadyRunning(self.name.clone()));
        }
        *database = Some(Arc::new(MemoryDatabase::new(self.name.clone())));
        log::info!("Started in-memory persistence unit '{}'", self.name);
        Ok(())
    }

    fn stop(&self) -> Result<(), PersistenceError> {
        if self.database.write().take().is_some() {
            log::info!("Stopped in-memory persistence unit '{}'", self.name);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.database.read().is_some()
    }
}

impl SessionProvider for MemorySessionFactory {
    type Session = MemorySession;

    fn open(&self) -> Result<Arc<MemorySession>, PersistenceError> {
        let database = self.database()?;
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemorySession::new(
            database,
            self.properties.clone(),
        )))
    }

    fn close(&self, session: Arc<MemorySession>) -> Result<(), PersistenceError> {
        session.close();
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
