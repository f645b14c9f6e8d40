//! Date ranges for time-windowed lookups

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result, StoreError, StoreErrorKind, StoreOperation};
use crate::query::FindOptions;

/// A half-open time window applied to a document field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Window start, inclusive boundary semantics are the caller's concern
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    /// Window end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Create a validated range; `end` must not precede `start`
    ///
    /// A missing start defaults to now; a missing end defaults to the start.
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<Self> {
        if start.is_none() && end.is_none() {
            return Ok(Self::default());
        }

        let start = start.unwrap_or_else(Utc::now);
        let end = end.unwrap_or(start);

        if end < start {
            return Err(Error::Store(StoreError::new(
                StoreOperation::Find,
                StoreErrorKind::Configuration,
                "date range end precedes start",
            )));
        }

        Ok(Self {
            start: Some(start),
            end: Some(end),
        })
    }

    /// A single-instant range
    pub fn from_start(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(start),
        }
    }

    /// A seven-day window beginning at `start`
    pub fn week(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(start + Duration::days(6)),
        }
    }

    /// The same window shifted by a signed duration
    ///
    /// Returns `None` when either boundary is missing.
    pub fn shifted(&self, by: Duration) -> Option<Self> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(Self {
                start: Some(start + by),
                end: Some(end + by),
            }),
            _ => None,
        }
    }

    /// True when neither boundary is set
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Add range filters on `field` for whichever boundaries are present
    pub fn apply(&self, options: &mut FindOptions, field: &str) {
        if let Some(start) = self.start {
            options.add_greater(field, mongodb::bson::DateTime::from_chrono(start));
        }
        if let Some(end) = self.end {
            options.add_less(field, mongodb::bson::DateTime::from_chrono(end));
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_range() {
        let range = DateRange::new(None, None).expect("empty range");
        assert!(range.is_empty());
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let result = DateRange::new(Some(at(2024, 5, 2)), Some(at(2024, 5, 1)));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_end_defaults_to_start() {
        let start = at(2024, 5, 1);
        let range = DateRange::new(Some(start), None).expect("range");
        assert_eq!(range.end, Some(start));
    }

    #[test]
    fn test_week_spans_six_days() {
        let range = DateRange::week(at(2024, 5, 1));
        assert_eq!(range.end, Some(at(2024, 5, 7)));
    }

    #[test]
    fn test_shifted() {
        let range = DateRange::from_start(at(2024, 5, 1));
        let shifted = range.shifted(Duration::days(1)).expect("shifted");
        assert_eq!(shifted.start, Some(at(2024, 5, 2)));

        assert!(DateRange::default().shifted(Duration::days(1)).is_none());
    }

    #[test]
    fn test_apply_adds_boundary_filters() {
        let mut options = FindOptions::new();
        DateRange::week(at(2024, 5, 1)).apply(&mut options, "created_by.time");
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters[0].key, "created_by.time");
    }
}
