//! Resources: bounded non-negative scalars with consumption accounting

use crate::{Error, Result, ResourceId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A bounded non-negative scalar owned by a character.
///
/// Invariant: `0 <= current <= upper_limit`. Consumption below zero fails,
/// gains silently saturate at the upper limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier
    pub id: ResourceId,
    /// Maximum amount this resource can hold
    pub upper_limit: f64,
    /// Current amount
    pub current: f64,
    /// Total amount ever consumed, for statistics. Monotone.
    #[serde(default)]
    pub consume_total: f64,
}

impl Resource {
    /// Create a new resource. The initial amount is clamped into
    /// `[0, upper_limit]`.
    pub fn new(id: impl Into<ResourceId>, upper_limit: f64, current: f64) -> Self {
        Self {
            id: id.into(),
            upper_limit,
            current: current.clamp(0.0, upper_limit),
            consume_total: 0.0,
        }
    }

    /// Apply a delta to the current amount.
    ///
    /// - `amount < 0` consumes; fails with `InsufficientResource` if the
    ///   result would be negative, and counts toward `consume_total`.
    /// - `amount > 0` produces, saturating at `upper_limit`. Overflow is
    ///   dropped and not counted as consumption.
    /// - `amount == 0` is a no-op.
    pub fn update(&mut self, amount: f64) -> Result<()> {
        if amount < 0.0 {
            if self.current + amount < 0.0 {
                return Err(Error::InsufficientResource {
                    id: self.id.clone(),
                    need: -amount,
                    have: self.current,
                });
            }
            self.consume_total -= amount;
            self.current += amount;
        } else if amount > 0.0 {
            self.current = (self.current + amount).min(self.upper_limit);
        }
        Ok(())
    }
}

/// All resources of a character, keyed by id.
///
/// Iteration order is registration order, which matters: rules and reports
/// observe resources in the order they were registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    resources: IndexMap<ResourceId, Resource>,
}

impl ResourcePool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource. Fails on a duplicate id.
    pub fn insert(&mut self, resource: Resource) -> Result<()> {
        if self.resources.contains_key(&resource.id) {
            return Err(Error::Duplicate(resource.id.to_string()));
        }
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    /// Look up a resource
    pub fn get(&self, id: &ResourceId) -> Result<&Resource> {
        self.resources
            .get(id)
            .ok_or_else(|| Error::UnknownResource(id.clone()))
    }

    /// Look up a resource mutably
    pub fn get_mut(&mut self, id: &ResourceId) -> Result<&mut Resource> {
        self.resources
            .get_mut(id)
            .ok_or_else(|| Error::UnknownResource(id.clone()))
    }

    /// Whether a resource with this id is registered
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.resources.contains_key(id)
    }

    /// Iterate resources in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
