// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Transaction facades and global transaction coordination

pub mod facade;
pub mod global;

pub use facade::{TransactionFacade, TransactionRole, TransactionStrategy};
pub use global::{
    ThreadBoundCoordinator, TransactionStatus, UserTransaction, UserTransactionRegistry,
};
