//! Test utilities for txscope integration tests
//!
//! - TestFixture: one in-memory persistence unit, local or JTA
//! - TaskKind: the twelve policy/error combinations used by the transaction tests

#![allow(dead_code)]

pub mod test_fixture;
