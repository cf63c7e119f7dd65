// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-process reference backend
//!
//! A small transactional key/value backend implementing the session
//! contracts, used for embedded setups and for exercising the transaction
//! machinery end to end.
//!
//! - [`MemoryDatabase`]: committed records of one persistence unit
//! - [`MemorySessionFactory`]: application-managed session factory
//! - [`MemorySession`]: a session buffering writes until commit

pub mod database;
pub mod factory;
pub mod session;

pub use database::MemoryDatabase;
pub use factory::MemorySessionFactory;
pub use session::MemorySession;
