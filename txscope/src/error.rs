// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistence error types

use crate::policy::{Categorized, ErrorCategory, PERSISTENCE_ERROR};
use crate::unit::PersistenceUnitId;
use thiserror::Error;

/// Structural errors raised by the unit-of-work and transaction machinery
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Unit of work is not active")]
    NotActive,

    #[error("Unit of work has already been started")]
    AlreadyActive,

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Persistence service is not running: {0}")]
    NotRunning(String),

    #[error("Persistence service is already running: {0}")]
    AlreadyRunning(String),

    #[error("Operation requires an active transaction")]
    TransactionRequired,

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{operation} failed on unit '{unit}' after {completed} unit(s) completed: {source}")]
    FanOut {
        operation: &'static str,
        unit: PersistenceUnitId,
        completed: usize,
        #[source]
        source: Box<PersistenceError>,
    },
}

impl Categorized for PersistenceError {
    fn category(&self) -> &'static ErrorCategory {
        &PERSISTENCE_ERROR
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        PersistenceError::Configuration(error.to_string())
    }
}
