// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Session and unit-of-work management
//!
//! This module defines the contracts the transaction machinery consumes from a
//! persistence backend:
//! - [`PersistenceService`]: start/stop lifecycle of a backend
//! - [`SessionProvider`]: opens and closes backend sessions
//! - [`Session`]: a backend session owning one physical transaction at a time
//! - [`UnitOfWork`]: binding of one session to the current thread
//!
//! # Unit of work
//!
//! [`ThreadScopedUnitOfWork`] keeps one session per thread of execution. The
//! session is looked up by the calling thread's id, so sessions are never
//! shared across threads.

pub mod provider;
pub mod unit_of_work;

pub use provider::{PersistenceService, Session, SessionProvider};
pub use unit_of_work::{ThreadScopedUnitOfWork, UnitOfWork};
