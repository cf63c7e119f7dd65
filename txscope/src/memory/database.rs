// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Committed record store

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A buffered write, applied when the owning transaction commits
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// A record was stored - on commit, insert or replace it
    Put { key: String, value: Value },
    /// A record was removed - on commit, delete it
    Remove { key: String },
}

impl PendingWrite {
    pub fn key(&self) -> &str {
        match self {
            PendingWrite::Put { key, .. } => key,
            PendingWrite::Remove { key } => key,
        }
    }
}

/// Committed records of one persistence unit
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    records: RwLock<BTreeMap<String, Value>>,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: RwLock::new(BTreeMap::new()),
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read a committed record
    pub fn get(&self, key: &str) -> Option<Value> {
        self.records.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Number of transactions committed against this database
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of transactions rolled back against this database
    pub fn rollback_count(&self) -> u64 {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Apply the writes of one transaction under a single lock
    pub(crate) fn apply(&self, writes: Vec<PendingWrite>) {
        let mut records = self.records.write();
        for write in writes {
            match write {
                PendingWrite::Put { key, value } => {
                    records.insert(key, value);
                }
                PendingWrite::Remove { key } => {
                    records.remove(&key);
                }
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
    }
}
