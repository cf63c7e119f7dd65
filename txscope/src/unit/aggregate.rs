// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fan-out over every registered persistence unit
//!
//! Lifecycle and unit-of-work calls are applied to each unit in registration
//! order under one aggregate-wide lock. A failing unit stops the fan-out and
//! is reported as [`PersistenceError::FanOut`]; units processed before it are
//! left as they are.

use crate::error::PersistenceError;
use crate::session::{PersistenceService, UnitOfWork};
use crate::unit::PersistenceUnitId;
use parking_lot::Mutex;
use std::sync::Arc;

struct RegisteredUnit {
    id: PersistenceUnitId,
    service: Arc<dyn PersistenceService>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

/// Group of persistence units driven in lock-step
#[derive(Default)]
pub struct PersistenceUnitAggregate {
    units: Mutex<Vec<RegisteredUnit>>,
}

impl PersistenceUnitAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit; it joins every subsequent fan-out
    pub fn add(
        &self,
        id: PersistenceUnitId,
        service: Arc<dyn PersistenceService>,
        unit_of_work: Arc<dyn UnitOfWork>,
    ) {
        log::debug!("Registered unit '{}' with the aggregate", id);
        self.units.lock().push(RegisteredUnit {
            id,
            service,
            unit_of_work,
        });
    }

    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }

    /// Unit ids in registration order
    pub fn unit_ids(&self) -> Vec<PersistenceUnitId> {
        self.units.lock().iter().map(|unit| unit.id.clone()).collect()
    }

    fn fan_out<F>(&self, operation: &'static str, mut apply: F) -> Result<(), PersistenceError>
    where
        F: FnMut(&RegisteredUnit) -> Result<(), PersistenceError>,
    {
        let units = self.units.lock();
        for (completed, unit) in units.iter().enumerate() {
            if let Err(e) = apply(unit) {
                log::warn!(
                    "Aggregate {} failed on unit '{}' after {} unit(s) completed: {}",
                    operation,
                    unit.id,
                    completed,
                    e
                );
                return Err(PersistenceError::FanOut {
                    operation,
                    unit: unit.id.clone(),
                    completed,
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }
}

impl PersistenceService for PersistenceUnitAggregate {
    fn start(&self) -> Result<(), PersistenceError> {
        self.fan_out("start", |unit| unit.service.start())
    }

    fn stop(&self) -> Result<(), PersistenceError> {
        self.fan_out("stop", |unit| unit.service.stop())
    }

    /// True when every unit is running, including when none is registered
    fn is_running(&self) -> bool {
        self.units
            .lock()
            .iter()
            .all(|unit| unit.service.is_running())
    }
}

impl UnitOfWork for PersistenceUnitAggregate {
    fn begin(&self) -> Result<(), PersistenceError> {
        self.fan_out("begin", |unit| unit.unit_of_work.begin())
    }

    /// True when every unit has an active unit of work, including when none
    /// is registered
    fn is_active(&self) -> bool {
        self.units
            .lock()
            .iter()
            .all(|unit| unit.unit_of_work.is_active())
    }

    fn end(&self) -> Result<(), PersistenceError> {
        self.fan_out("end", |unit| unit.unit_of_work.end())
    }
}
