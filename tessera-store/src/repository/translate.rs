//! Translation of the query model into native BSON
//!
//! Each [`Filter`] becomes exactly one sub-clause; sub-clauses combine under
//! `$and` in insertion order. OR-groups are rejected with a typed error
//! rather than silently dropped. String values are opportunistically
//! re-parsed as dates before being sent to the store.
//!
//! The array-mutation pipelines live here as pure builders: match the
//! document by id, compute the new array value with a conditional
//! expression, then `$merge` the computed field back in place. A single
//! pipeline per mutation means no fetch-then-write race under concurrent
//! callers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, Bson, Document, Regex};

use crate::error::{Result, StoreError, StoreOperation};
use crate::query::{FilterOperator, FindOptions, Orders};

/// Build the native filter document for the given options
///
/// Produces one `$and` sub-clause per filter, in insertion order. An empty
/// options value yields an empty document (match everything); guarding
/// against that for destructive operations is the repository's job.
pub fn build_filter(options: &FindOptions, operation: StoreOperation) -> Result<Document> {
    if !options.filters_or.is_empty() {
        return Err(StoreError::unsupported(
            operation,
            "OR-groups are accepted into the query model but have no translation; \
             restructure the query as AND filters",
        )
        .into());
    }

    let mut clauses: Vec<Document> = Vec::with_capacity(options.filters.len());
    for filter in &options.filters {
        let value = coerce_date(filter.value.clone());
        let clause = operator_clause(filter.operator, value, operation)?;
        clauses.push(doc! { filter.key.clone(): clause });
    }

    let mut result = Document::new();
    if !clauses.is_empty() {
        result.insert("$and", clauses);
    }
    Ok(result)
}

/// Build the native sort document, preserving key order
pub fn build_sort(orders: &Orders) -> Document {
    let mut sort = Document::new();
    for order in orders.iter() {
        sort.insert(order.field.clone(), order.direction);
    }
    sort
}

fn operator_clause(
    operator: FilterOperator,
    value: Bson,
    operation: StoreOperation,
) -> Result<Bson> {
    let clause = match operator {
        FilterOperator::Equals => value,
        FilterOperator::EqualsCaseInsensitive => {
            let pattern = expect_string(operator, value, operation)?;
            Bson::RegularExpression(Regex {
                pattern: format!("^{pattern}$"),
                options: "i".to_string(),
            })
        }
        FilterOperator::NotEquals => doc! { "$ne": value }.into(),
        FilterOperator::In => doc! { "$in": value }.into(),
        FilterOperator::NotIn => doc! { "$nin": value }.into(),
        FilterOperator::Size => doc! { "$size": value }.into(),
        FilterOperator::All => doc! { "$all": value }.into(),
        FilterOperator::Contains => {
            let pattern = expect_string(operator, value, operation)?;
            Bson::RegularExpression(Regex {
                pattern,
                options: "i".to_string(),
            })
        }
        FilterOperator::GroupsOfArrays => {
            doc! { "$elemMatch": { "$not": { "$elemMatch": { "$nin": value } } } }.into()
        }
        FilterOperator::Greater => doc! { "$gt": value }.into(),
        FilterOperator::Less => doc! { "$lt": value }.into(),
        FilterOperator::GreaterOrEqual => doc! { "$gte": value }.into(),
        FilterOperator::LessOrEqual => doc! { "$lte": value }.into(),
        FilterOperator::Exists => doc! { "$exists": true }.into(),
        FilterOperator::NotExists => doc! { "$exists": false }.into(),
    };
    Ok(clause)
}

fn expect_string(
    operator: FilterOperator,
    value: Bson,
    operation: StoreOperation,
) -> Result<String> {
    match value {
        Bson::String(s) => Ok(s),
        other => Err(StoreError::unsupported(
            operation,
            format!(
                "operator '{operator}' requires a string value, got {:?}",
                other.element_type()
            ),
        )
        .into()),
    }
}

/// Re-parse string values as dates before they reach the store
///
/// Formats are tried in a fixed order: RFC 3339, date only, date-time,
/// date-time with offset. A string matching none of them passes through
/// unchanged.
pub(crate) fn coerce_date(value: Bson) -> Bson {
    let Bson::String(ref raw) = value else {
        return value;
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return to_bson_datetime(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return to_bson_datetime(dt.and_utc());
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return to_bson_datetime(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%:z") {
        return to_bson_datetime(dt.with_timezone(&Utc));
    }

    value
}

fn to_bson_datetime(dt: DateTime<Utc>) -> Bson {
    Bson::DateTime(mongodb::bson::DateTime::from_chrono(dt))
}

/// Pipeline: add `value` to an array field unless already present
///
/// A field that is not an array (missing or scalar) is seeded as `[value]`.
pub fn array_add_pipeline(
    collection: &str,
    id: ObjectId,
    field: &str,
    value: &str,
) -> Vec<Document> {
    let path = format!("${field}");
    vec![
        doc! { "$match": { "_id": id } },
        doc! { "$addFields": { field: {
            "$cond": {
                "if": { "$eq": [ { "$type": path.as_str() }, "array" ] },
                "then": {
                    "$cond": {
                        "if": { "$in": [ value, path.as_str() ] },
                        "then": path.as_str(),
                        "else": { "$concatArrays": [ path.as_str(), [ value ] ] },
                    }
                },
                "else": [ value ],
            }
        } } },
        merge_stage(collection),
    ]
}

/// Pipeline: remove `value` from an array field if present
///
/// A field that is not an array is left as an empty array.
pub fn array_remove_pipeline(
    collection: &str,
    id: ObjectId,
    field: &str,
    value: &str,
) -> Vec<Document> {
    let path = format!("${field}");
    vec![
        doc! { "$match": { "_id": id } },
        doc! { "$addFields": { field: {
            "$cond": {
                "if": { "$eq": [ { "$type": path.as_str() }, "array" ] },
                "then": { "$setDifference": [ path.as_str(), [ value ] ] },
                "else": [],
            }
        } } },
        merge_stage(collection),
    ]
}

/// Pipeline: toggle membership of `value` in an array field
pub fn array_toggle_pipeline(
    collection: &str,
    id: ObjectId,
    field: &str,
    value: &str,
) -> Vec<Document> {
    let path = format!("${field}");
    vec![
        doc! { "$match": { "_id": id } },
        doc! { "$addFields": { field: {
            "$cond": {
                "if": { "$eq": [ { "$type": path.as_str() }, "array" ] },
                "then": {
                    "$cond": {
                        "if": { "$in": [ value, path.as_str() ] },
                        "then": { "$setDifference": [ path.as_str(), [ value ] ] },
                        "else": { "$concatArrays": [ path.as_str(), [ value ] ] },
                    }
                },
                "else": [ value ],
            }
        } } },
        merge_stage(collection),
    ]
}

/// Read-only pipeline reporting the length of an array field, 0 when the
/// field is not an array
pub fn array_len_pipeline(id: ObjectId, field: &str) -> Vec<Document> {
    let path = format!("${field}");
    vec![
        doc! { "$match": { "_id": id } },
        doc! { "$project": { "count": {
            "$cond": {
                "if": { "$eq": [ { "$type": path.as_str() }, "array" ] },
                "then": { "$size": path.as_str() },
                "else": 0,
            }
        } } },
    ]
}

fn merge_stage(collection: &str) -> Document {
    doc! { "$merge": {
        "into": collection,
        "on": "_id",
        "whenMatched": "merge",
        "whenNotMatched": "discard",
    } }
}
