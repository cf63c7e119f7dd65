// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory session with a buffered physical transaction

use super::database::{MemoryDatabase, PendingWrite};
use crate::error::PersistenceError;
use crate::session::Session;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Physical transaction state of a session
#[derive(Debug, Default)]
struct LocalTransaction {
    writes: Vec<PendingWrite>,
    rollback_only: bool,
    /// Joined to an externally coordinated transaction
    joined: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    transaction: Option<LocalTransaction>,
    closed: bool,
}

/// Session over a [`MemoryDatabase`]
///
/// Writes require a running transaction and stay invisible to other sessions
/// until it commits.
#[derive(Debug)]
pub struct MemorySession {
    id: Uuid,
    database: Arc<MemoryDatabase>,
    properties: BTreeMap<String, String>,
    state: Mutex<SessionState>,
}

impl MemorySession {
    pub(crate) fn new(database: Arc<MemoryDatabase>, properties: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            database,
            properties,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.database
    }

    /// Session property inherited from the persistence unit configuration
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Store a record in the running transaction
    pub fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let value = serde_json::to_value(value)
            .map_err(|e| PersistenceError::Backend(format!("Failed to serialize {}: {}", key, e)))?;
        self.write(PendingWrite::Put {
            key: key.to_string(),
            value,
        })
    }

    /// Remove a record in the running transaction
    pub fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.write(PendingWrite::Remove {
            key: key.to_string(),
        })
    }

    /// Read a record, seeing this session's uncommitted writes first
    pub fn find<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        let value = {
            let state = self.state.lock();
            if state.closed {
                return Err(PersistenceError::Backend(format!(
                    "Session {} is closed",
                    self.id
                )));
            }

            let pending = state.transaction.as_ref().and_then(|txn| {
                txn.writes.iter().rev().find(|write| write.key() == key).cloned()
            });
            match pending {
                Some(PendingWrite::Put { value, .. }) => Some(value),
                Some(PendingWrite::Remove { .. }) => None,
                None => self.database.get(key),
            }
        };

        value
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    PersistenceError::Backend(format!("Failed to deserialize {}: {}", key, e))
                })
            })
            .transpose()
    }

    /// Check whether a record is visible to this session
    pub fn contains(&self, key: &str) -> Result<bool, PersistenceError> {
        Ok(self.find::<serde_json::Value>(key)?.is_some())
    }

    /// Number of writes buffered in the running transaction
    pub fn pending_writes(&self) -> usize {
        self.state
            .lock()
            .transaction
            .as_ref()
            .map(|txn| txn.writes.len())
            .unwrap_or(0)
    }

    fn write(&self, write: PendingWrite) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Backend(format!(
                "Session {} is closed",
                self.id
            )));
        }
        let txn = state
            .transaction
            .as_mut()
            .ok_or(PersistenceError::TransactionRequired)?;
        txn.writes.push(write);
        Ok(())
    }

    /// Close the session, rolling back a running transaction it still owns
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;

        let owned = state
            .transaction
            .as_ref()
            .map(|txn| !txn.joined)
            .unwrap_or(false);
        if owned {
            log::warn!(
                "Session {} closed with a running transaction - rolling back",
                self.id
            );
            state.transaction = None;
            self.database.record_rollback();
        }
    }

    fn no_transaction(&self) -> PersistenceError {
        PersistenceError::Transaction(format!("No active transaction on session {}", self.id))
    }
}

impl Session for MemorySession {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn begin_transaction(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Backend(format!(
                "Session {} is closed",
                self.id
            )));
        }
        if state.transaction.is_some() {
            return Err(PersistenceError::Transaction(format!(
                "Transaction already in progress on session {}",
                self.id
            )));
        }
        state.transaction = Some(LocalTransaction::default());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<(), PersistenceError> {
        let txn = self
            .state
            .lock()
            .transaction
            .take()
            .ok_or_else(|| self.no_transaction())?;

        if txn.rollback_only {
            self.database.record_rollback();
            return Err(PersistenceError::Transaction(format!(
                "Transaction on session {} was marked rollback-only and has been rolled back",
                self.id
            )));
        }

        log::debug!(
            "Session {} committing {} write(s) to '{}'",
            self.id,
            txn.writes.len(),
            self.database.name()
        );
        self.database.apply(txn.writes);
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<(), PersistenceError> {
        let txn = self
            .state
            .lock()
            .transaction
            .take()
            .ok_or_else(|| self.no_transaction())?;

        log::debug!(
            "Session {} discarding {} write(s)",
            self.id,
            txn.writes.len()
        );
        self.database.record_rollback();
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        self.state.lock().transaction.is_some()
    }

    fn set_rollback_only(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        match state.transaction.as_mut() {
            Some(txn) => {
                txn.rollback_only = true;
                Ok(())
            }
            None => Err(self.no_transaction()),
        }
    }

    fn is_rollback_only(&self) -> bool {
        self.state
            .lock()
            .transaction
            .as_ref()
            .map(|txn| txn.rollback_only)
            .unwrap_or(false)
    }

    fn join_transaction(&self) -> Result<(), PersistenceError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PersistenceError::Backend(format!(
                "Session {} is closed",
                self.id
            )));
        }
        state
            .transaction
            .get_or_insert_with(LocalTransaction::default)
            .joined = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (Arc<MemoryDatabase>, MemorySession) {
        let db = Arc::new(MemoryDatabase::new("db"));
        let session = MemorySession::new(db.clone(), BTreeMap::new());
        (db, session)
    }

    #[test]
    fn test_write_requires_transaction() {
        let (_, session) = session();
        assert!(matches!(
            session.persist("k", &1),
            Err(PersistenceError::TransactionRequired)
        ));
    }

    #[test]
    fn test_commit_publishes_writes() {
        let (db, session) = session();
        session.begin_transaction().unwrap();
        session.persist("k", &"v").unwrap();

        assert_eq!(session.find::<String>("k").unwrap(), Some("v".to_string()));
        assert!(!db.contains("k"));

        session.commit_transaction().unwrap();
        assert!(db.contains("k"));
        assert!(!session.is_transaction_active());
    }

    #[test]
    fn test_rollback_discards_writes() {
        let (db, session) = session();
        session.begin_transaction().unwrap();
        session.persist("k", &1).unwrap();
        session.rollback_transaction().unwrap();

        assert!(db.is_empty());
        assert_eq!(session.find::<i32>("k").unwrap(), None);
        assert_eq!(db.rollback_count(), 1);
    }

    #[test]
    fn test_pending_remove_hides_committed_record() {
        let (db, session) = session();
        session.begin_transaction().unwrap();
        session.persist("k", &1).unwrap();
        session.commit_transaction().unwrap();

        session.begin_transaction().unwrap();
        session.remove("k").unwrap();
        assert!(!session.contains("k").unwrap());
        assert!(db.contains("k"));
        session.commit_transaction().unwrap();
        assert!(!db.contains("k"));
    }

    #[test]
    fn test_rollback_only_commit_rolls_back() {
        let (db, session) = session();
        session.begin_transaction().unwrap();
        session.persist("k", &1).unwrap();
        session.set_rollback_only().unwrap();
        assert!(session.is_rollback_only());

        assert!(session.commit_transaction().is_err());
        assert!(db.is_empty());
        assert!(!session.is_transaction_active());
    }

    #[test]
    fn test_begin_twice_fails() {
        let (_, session) = session();
        session.begin_transaction().unwrap();
        assert!(matches!(
            session.begin_transaction(),
            Err(PersistenceError::Transaction(_))
        ));
    }

    #[test]
    fn test_close_rolls_back_owned_transaction_only() {
        let (db, owned) = session();
        owned.begin_transaction().unwrap();
        owned.persist("a", &1).unwrap();
        owned.close();
        assert!(!owned.is_transaction_active());
        assert!(owned.persist("a", &1).is_err());

        let joined = MemorySession::new(db.clone(), BTreeMap::new());
        joined.join_transaction().unwrap();
        joined.persist("b", &2).unwrap();
        joined.close();
        assert!(joined.is_transaction_active());
        joined.commit_transaction().unwrap();
        assert!(db.contains("b"));
        assert!(!db.contains("a"));
    }
}
