//! Result ordering for the query model

use serde::{Deserialize, Serialize};

/// A single sort key: field plus direction (+1 ascending, -1 descending)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Field to sort on
    pub field: String,
    /// +1 for ascending, -1 for descending
    pub direction: i32,
}

impl Order {
    /// Ascending order on a field
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: 1,
        }
    }

    /// Descending order on a field
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: -1,
        }
    }
}

/// An ordered, de-duplicating list of sort keys
///
/// Adding an order that is already present (same field and direction) is a
/// no-op; iteration preserves insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orders(Vec<Order>);

impl Orders {
    /// Create an empty order list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add sort keys, skipping duplicates
    pub fn add(&mut self, orders: impl IntoIterator<Item = Order>) {
        for order in orders {
            if !self.has(&order) {
                self.0.push(order);
            }
        }
    }

    /// Whether an identical sort key is already present
    pub fn has(&self, order: &Order) -> bool {
        self.0.iter().any(|item| item == order)
    }

    /// Whether any of the given fields appears as a sort key
    pub fn has_field(&self, fields: &[&str]) -> bool {
        self.0.iter().any(|item| fields.contains(&item.field.as_str()))
    }

    /// True when no sort keys have been added
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of sort keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate sort keys in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.0.iter()
    }
}
