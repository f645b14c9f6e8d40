//! Backend-agnostic filter/order/pipeline bundle
//!
//! [`FindOptions`] is pure data: it knows nothing about the store it will be
//! translated for. Filters accumulate in insertion order and combine with
//! implicit AND; OR-groups are carried separately.

use mongodb::bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use super::filter::{Filter, FilterOperator};
use super::order::{Order, Orders};

/// Filters, OR-groups, ordering and an optional pre-built native pipeline
///
/// # Example
///
/// ```rust
/// use tessera_store::query::FindOptions;
///
/// let mut options = FindOptions::new();
/// options.add_equals("status", "active");
/// options.add_greater_or_equal("age", 18);
/// options.add_order_desc(["created_by.time"]);
/// assert_eq!(options.filters.len(), 2);
/// assert!(!options.filter_is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    /// Conditions combined with implicit AND, in insertion order
    pub filters: Vec<Filter>,
    /// Groups of conditions intended as OR-of-ANDs across groups
    pub filters_or: Vec<Vec<Filter>>,
    /// Sort keys
    pub order: Orders,
    /// Optional pre-built native aggregation pipeline
    #[serde(skip)]
    pub pipeline: Option<Vec<Document>>,
}

impl FindOptions {
    /// Create empty find options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter with an explicit operator
    ///
    /// Adding a filter with an empty field name is a silent no-op. This is
    /// defensive, not an error signal; callers must not rely on it to
    /// detect misuse.
    pub fn add(&mut self, key: impl Into<String>, operator: FilterOperator, value: impl Into<Bson>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        self.filters.push(Filter::new(key, operator, value));
    }

    /// `field == value`
    pub fn add_equals(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::Equals, value);
    }

    /// `field == value`, ignoring case
    pub fn add_equals_ci(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::EqualsCaseInsensitive, value);
    }

    /// `field != value`
    pub fn add_not_equals(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::NotEquals, value);
    }

    /// `field ∈ values`
    pub fn add_in(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::In, value);
    }

    /// `field ∉ values`
    pub fn add_not_in(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::NotIn, value);
    }

    /// Array field contains every listed element
    pub fn add_all(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::All, value);
    }

    /// Array field has exactly `value` elements
    pub fn add_size(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::Size, value);
    }

    /// Case-insensitive substring match
    pub fn add_contains(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::Contains, value);
    }

    /// `field > value`
    pub fn add_greater(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::Greater, value);
    }

    /// `field >= value`
    pub fn add_greater_or_equal(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::GreaterOrEqual, value);
    }

    /// `field < value`
    pub fn add_less(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::Less, value);
    }

    /// `field <= value`
    pub fn add_less_or_equal(&mut self, key: impl Into<String>, value: impl Into<Bson>) {
        self.add(key, FilterOperator::LessOrEqual, value);
    }

    /// Open range: `from_key > from_value AND to_key < to_value`
    pub fn add_range(
        &mut self,
        from_key: impl Into<String>,
        from_value: impl Into<Bson>,
        to_key: impl Into<String>,
        to_value: impl Into<Bson>,
    ) {
        self.add(from_key, FilterOperator::Greater, from_value);
        self.add(to_key, FilterOperator::Less, to_value);
    }

    /// The field is present
    pub fn add_exists(&mut self, key: impl Into<String>) {
        self.add(key, FilterOperator::Exists, Bson::Null);
    }

    /// The field is absent
    pub fn add_not_exists(&mut self, key: impl Into<String>) {
        self.add(key, FilterOperator::NotExists, Bson::Null);
    }

    /// Add a group of conditions to the OR set; empty groups are ignored
    pub fn add_or_group(&mut self, group: Vec<Filter>) {
        if group.is_empty() {
            return;
        }
        self.filters_or.push(group);
    }

    /// Ascending sort keys
    pub fn add_order_asc<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.add(fields.into_iter().map(Order::asc));
    }

    /// Descending sort keys
    pub fn add_order_desc<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order.add(fields.into_iter().map(Order::desc));
    }

    /// Drop the first filter on the given key, if any
    pub fn remove(&mut self, key: &str) {
        if let Some(position) = self.filters.iter().position(|f| f.key == key) {
            self.filters.remove(position);
        }
    }

    /// True when both the AND filters and the OR-groups are empty
    ///
    /// Used to guard destructive bulk operations: `update_many` and bulk
    /// `delete` must never run against an empty filter.
    pub fn filter_is_empty(&self) -> bool {
        self.filters.is_empty() && self.filters_or.is_empty()
    }

    /// Pretty JSON rendering for logs and diagnostics
    ///
    /// The native pipeline, when present, is omitted.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "<unserializable>".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_accumulate_in_insertion_order() {
        let mut options = FindOptions::new();
        options.add_equals("a", 1);
        options.add_not_equals("b", 2);
        options.add_greater("c", 3);
        let keys: Vec<&str> = options.filters.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_key_is_a_silent_no_op() {
        let mut options = FindOptions::new();
        options.add_equals("", "value");
        options.add("", FilterOperator::In, vec!["x".to_string()]);
        assert!(options.filters.is_empty());
        assert!(options.filter_is_empty());
    }

    #[test]
    fn test_range_adds_two_filters() {
        let mut options = FindOptions::new();
        options.add_range("start", "2024-01-01", "end", "2024-02-01");
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters[0].operator, FilterOperator::Greater);
        assert_eq!(options.filters[1].operator, FilterOperator::Less);
    }

    #[test]
    fn test_filter_is_empty_considers_or_groups() {
        let mut options = FindOptions::new();
        assert!(options.filter_is_empty());

        options.add_or_group(vec![Filter::new("a", FilterOperator::Equals, 1)]);
        assert!(!options.filter_is_empty());
    }

    #[test]
    fn test_empty_or_group_ignored() {
        let mut options = FindOptions::new();
        options.add_or_group(vec![]);
        assert!(options.filters_or.is_empty());
    }

    #[test]
    fn test_remove_drops_first_match_only() {
        let mut options = FindOptions::new();
        options.add_equals("status", "active");
        options.add_equals("status", "pending");
        options.add_equals("kind", "order");

        options.remove("status");
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters[0].value, mongodb::bson::Bson::from("pending"));

        options.remove("missing");
        assert_eq!(options.filters.len(), 2);
    }

    #[test]
    fn test_to_json_renders_filters() {
        let mut options = FindOptions::new();
        options.add_equals("status", "active");
        let json = options.to_json();
        assert!(json.contains("status"));
        assert!(json.contains("active"));
    }

    #[test]
    fn test_order_builders_deduplicate() {
        let mut options = FindOptions::new();
        options.add_order_asc(["name", "name"]);
        options.add_order_desc(["age"]);
        options.add_order_asc(["name"]);
        assert_eq!(options.order.len(), 2);
    }

    #[test]
    fn test_exists_filters() {
        let mut options = FindOptions::new();
        options.add_exists("external_id");
        options.add_not_exists("deleted_by");
        assert_eq!(options.filters[0].operator, FilterOperator::Exists);
        assert_eq!(options.filters[1].operator, FilterOperator::NotExists);
    }
}
