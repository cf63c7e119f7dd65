// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistence unit configuration

use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How transactions of a persistence unit are coordinated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Transactions on the unit's own sessions
    #[default]
    ResourceLocal,
    /// Transactions coordinated by a user transaction shared across units
    Jta,
}

/// Configuration of one persistence unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceUnitConfig {
    pub name: String,
    #[serde(default)]
    pub transaction_type: TransactionType,
    /// Backend properties handed to every session of the unit
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PersistenceUnitConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transaction_type: TransactionType::default(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Configuration of all persistence units of an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub units: Vec<PersistenceUnitConfig>,
    /// Registry name of the user transaction used by JTA units
    #[serde(default)]
    pub user_transaction_name: Option<String>,
}

impl PersistenceConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, PersistenceError> {
        let config: PersistenceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn unit(&self, name: &str) -> Option<&PersistenceUnitConfig> {
        self.units.iter().find(|unit| unit.name == name)
    }

    /// Check unit names are non-empty and unique
    pub fn validate(&self) -> Result<(), PersistenceError> {
        let mut seen = BTreeSet::new();
        for unit in &self.units {
            if unit.name.trim().is_empty() {
                return Err(PersistenceError::Configuration(
                    "Persistence unit name must not be empty".to_string(),
                ));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(PersistenceError::Configuration(format!(
                    "Duplicate persistence unit '{}'",
                    unit.name
                )));
            }
        }
        Ok(())
    }

    /// Whether any unit needs a user transaction
    pub fn requires_user_transaction(&self) -> bool {
        self.units
            .iter()
            .any(|unit| unit.transaction_type == TransactionType::Jta)
    }
}
