// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Call-site policy resolution and caching
//!
//! Policies are static for a call site, so they are resolved once and kept
//! in a [`PolicyCache`]. The lookup chain is: the method itself, then its
//! declaring type, then [`DEFAULT_POLICY`].

use super::{TransactionPolicy, DEFAULT_POLICY};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of an intercepted operation: declaring type plus method name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    type_name: &'static str,
    method: &'static str,
}

impl CallSite {
    pub fn new(type_name: &'static str, method: &'static str) -> Self {
        Self { type_name, method }
    }

    /// Call site for a method declared on `T`
    pub fn of<T: ?Sized>(method: &'static str) -> Self {
        Self::new(std::any::type_name::<T>(), method)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn method(&self) -> &'static str {
        self.method
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method)
    }
}

/// Source of explicitly declared policies
///
/// Returning `None` means "nothing declared"; the cache then falls back to the
/// default policy.
pub trait PolicyResolver: Send + Sync {
    fn resolve(&self, site: &CallSite) -> Option<TransactionPolicy>;
}

impl<F> PolicyResolver for F
where
    F: Fn(&CallSite) -> Option<TransactionPolicy> + Send + Sync,
{
    fn resolve(&self, site: &CallSite) -> Option<TransactionPolicy> {
        self(site)
    }
}

/// Policies declared per method and per type
#[derive(Debug, Default)]
pub struct AnnotatedPolicies {
    methods: HashMap<CallSite, TransactionPolicy>,
    types: HashMap<&'static str, TransactionPolicy>,
}

impl AnnotatedPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the policy of a single method
    pub fn annotate_method(mut self, site: CallSite, policy: TransactionPolicy) -> Self {
        self.methods.insert(site, policy);
        self
    }

    /// Declare the policy of every method of a type without its own policy
    pub fn annotate_type(mut self, type_name: &'static str, policy: TransactionPolicy) -> Self {
        self.types.insert(type_name, policy);
        self
    }

    pub fn annotate_type_of<T: ?Sized>(self, policy: TransactionPolicy) -> Self {
        self.annotate_type(std::any::type_name::<T>(), policy)
    }
}

impl PolicyResolver for AnnotatedPolicies {
    fn resolve(&self, site: &CallSite) -> Option<TransactionPolicy> {
        self.methods
            .get(site)
            .or_else(|| self.types.get(site.type_name()))
            .cloned()
    }
}

/// Memoizes resolved policies per call site
pub struct PolicyCache {
    resolver: Arc<dyn PolicyResolver>,
    entries: RwLock<HashMap<CallSite, Arc<TransactionPolicy>>>,
}

impl PolicyCache {
    pub fn new(resolver: Arc<dyn PolicyResolver>) -> Self {
        Self {
            resolver,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache that resolves every call site to the default policy
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(AnnotatedPolicies::new()))
    }

    /// Get the policy of a call site, resolving it on first use
    pub fn policy_for(&self, site: &CallSite) -> Arc<TransactionPolicy> {
        if let Some(policy) = self.entries.read().get(site) {
            return policy.clone();
        }

        let resolved = match self.resolver.resolve(site) {
            Some(policy) => Arc::new(policy),
            None => {
                log::debug!("No policy declared for {}, using default", site);
                DEFAULT_POLICY.clone()
            }
        };

        // A concurrent resolution of the same site may have won the race
        self.entries
            .write()
            .entry(*site)
            .or_insert(resolved)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}
