//! Filter conditions for the backend-agnostic query model

use std::fmt;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// Comparison operators for filter conditions
///
/// The set is closed: a translator implements exactly these and nothing
/// else, so an unknown operator is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Exact match
    Equals,
    /// Exact match ignoring case (string fields)
    EqualsCaseInsensitive,
    /// Inverse of exact match
    NotEquals,
    /// Value is one of a list
    In,
    /// Value is not one of a list
    NotIn,
    /// Array field has exactly this many elements
    Size,
    /// Array field contains every listed element
    All,
    /// Substring match ignoring case (string fields)
    Contains,
    /// Nested arrays: no element outside an allowed set
    GroupsOfArrays,
    /// Strictly greater than
    Greater,
    /// Strictly less than
    Less,
    /// Greater than or equal to
    GreaterOrEqual,
    /// Less than or equal to
    LessOrEqual,
    /// The field is present
    Exists,
    /// The field is absent
    NotExists,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals => write!(f, "="),
            Self::EqualsCaseInsensitive => write!(f, "equal_ci"),
            Self::NotEquals => write!(f, "!="),
            Self::In => write!(f, "in"),
            Self::NotIn => write!(f, "not_in"),
            Self::Size => write!(f, "size"),
            Self::All => write!(f, "all"),
            Self::Contains => write!(f, "contains"),
            Self::GroupsOfArrays => write!(f, "groups_of_arrays"),
            Self::Greater => write!(f, "greater"),
            Self::Less => write!(f, "less"),
            Self::GreaterOrEqual => write!(f, "greater_or_equal"),
            Self::LessOrEqual => write!(f, "less_or_equal"),
            Self::Exists => write!(f, "not_nil"),
            Self::NotExists => write!(f, "nil"),
        }
    }
}

/// A single filter condition: field, operator, value
///
/// # Example
///
/// ```rust
/// use tessera_store::query::{Filter, FilterOperator};
///
/// let filter = Filter::new("status", FilterOperator::Equals, "active");
/// assert_eq!(filter.key, "status");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// The field name to filter on
    pub key: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: Bson,
}

impl Filter {
    /// Create a new filter condition
    pub fn new(key: impl Into<String>, operator: FilterOperator, value: impl Into<Bson>) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_wire_names() {
        assert_eq!(format!("{}", FilterOperator::Equals), "=");
        assert_eq!(format!("{}", FilterOperator::EqualsCaseInsensitive), "equal_ci");
        assert_eq!(format!("{}", FilterOperator::NotEquals), "!=");
        assert_eq!(format!("{}", FilterOperator::NotIn), "not_in");
        assert_eq!(format!("{}", FilterOperator::GroupsOfArrays), "groups_of_arrays");
        assert_eq!(format!("{}", FilterOperator::GreaterOrEqual), "greater_or_equal");
        assert_eq!(format!("{}", FilterOperator::Exists), "not_nil");
        assert_eq!(format!("{}", FilterOperator::NotExists), "nil");
    }

    #[test]
    fn test_filter_new() {
        let filter = Filter::new("age", FilterOperator::GreaterOrEqual, 18);
        assert_eq!(filter.key, "age");
        assert_eq!(filter.operator, FilterOperator::GreaterOrEqual);
        assert_eq!(filter.value, Bson::Int32(18));
    }
}
