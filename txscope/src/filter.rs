// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Request-scoped unit of work
//!
//! [`PersistenceFilter`] opens a unit of work on every registered unit for the
//! duration of one request, so that all transactional calls made while
//! handling it share the same sessions.

use crate::error::PersistenceError;
use crate::session::unit_of_work::EndOnUnwind;
use crate::session::{PersistenceService, UnitOfWork};
use crate::unit::PersistenceUnitAggregate;
use std::sync::Arc;

pub struct PersistenceFilter {
    aggregate: Arc<PersistenceUnitAggregate>,
}

impl PersistenceFilter {
    pub fn new(aggregate: Arc<PersistenceUnitAggregate>) -> Self {
        Self { aggregate }
    }

    /// Start every persistence unit
    pub fn init(&self) -> Result<(), PersistenceError> {
        self.aggregate.start()
    }

    /// Stop every persistence unit
    pub fn destroy(&self) -> Result<(), PersistenceError> {
        self.aggregate.stop()
    }

    /// Handle one request inside a unit of work spanning every unit
    ///
    /// The unit of work is always ended, whether the request fails or panics.
    /// An error ending it is only returned when the request itself succeeded.
    pub fn handle<T, E, F>(&self, request: F) -> Result<T, E>
    where
        E: From<PersistenceError>,
        F: FnOnce() -> Result<T, E>,
    {
        if let Err(e) = self.aggregate.begin() {
            // Units begun before the failing one must not keep their sessions
            if let Err(end_error) = self.aggregate.end() {
                log::error!("Failed to release partially begun units: {}", end_error);
            }
            return Err(e.into());
        }

        let mut guard = EndOnUnwind::new(self.aggregate.as_ref(), true);
        let result = request();
        guard.disarm();

        match self.aggregate.end() {
            Err(e) if result.is_ok() => Err(e.into()),
            Err(e) => {
                log::error!("Failed to end unit of work after failed request: {}", e);
                result
            }
            Ok(()) => result,
        }
    }
}
