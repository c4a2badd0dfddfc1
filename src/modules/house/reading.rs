use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const KEY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Cache key of the `CurrentSnapshot`.
pub const CURRENT_KEY: &str = "current";

/// Cache key of a sensor's `ReadingSeries`.
pub fn series_key(serial: &str) -> String {
    format!("r-{}", serial)
}

/// A single sensor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub serial: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Deterministic key used by the durable store, e.g. `20240101000000_A`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.timestamp.format(KEY_FORMAT), self.serial)
    }
}

/// Most recent value per serial. Always derivable from the series heads.
pub type CurrentSnapshot = BTreeMap<String, f64>;

/// Bounded history for one sensor, most recent reading first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingSeries(Vec<Reading>);

impl ReadingSeries {
    /// Merges freshly leased readings into a cached series.
    ///
    /// Readings are ordered newest first. Equal timestamps keep their
    /// relative order, with `fresh` ahead of `existing`. Exact duplicates
    /// (same timestamp and value) collapse to one entry, so redelivering
    /// a reading never grows the series. The result keeps at most
    /// `max_items` entries.
    pub fn merge(fresh: Vec<Reading>, existing: ReadingSeries, max_items: usize) -> Self {
        let mut readings = fresh;
        readings.extend(existing.0);
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut seen = HashSet::new();
        readings.retain(|r| seen.insert((r.timestamp, r.value.to_bits())));
        readings.truncate(max_items);

        ReadingSeries(readings)
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.0.first()
    }

    pub fn readings(&self) -> &[Reading] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Reading>> for ReadingSeries {
    fn from(readings: Vec<Reading>) -> Self {
        ReadingSeries(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64, value: f64) -> Reading {
        Reading {
            serial: "A".to_string(),
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn key_uses_second_precision() {
        let mut r = at(5, 21.5);
        r.timestamp = r.timestamp + Duration::milliseconds(750);
        assert_eq!(r.key(), "20240101000500_A");
    }

    #[test]
    fn merge_sorts_newest_first() {
        let series = ReadingSeries::merge(
            vec![at(1, 1.0), at(10, 10.0)],
            ReadingSeries::from(vec![at(7, 7.0), at(3, 3.0)]),
            250,
        );

        let values: Vec<f64> = series.readings().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![10.0, 7.0, 3.0, 1.0]);
        for pair in series.readings().windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
        assert_eq!(series.latest().map(|r| r.value), Some(10.0));
    }

    #[test]
    fn merge_keeps_the_most_recent_max_items() {
        let existing: Vec<Reading> = (0..240).rev().map(|m| at(m, m as f64)).collect();
        let fresh: Vec<Reading> = (240..300).map(|m| at(m, m as f64)).collect();

        let series = ReadingSeries::merge(fresh, ReadingSeries::from(existing), 250);

        assert_eq!(series.len(), 250);
        assert_eq!(series.latest().map(|r| r.value), Some(299.0));
        assert_eq!(series.readings().last().map(|r| r.value), Some(50.0));
    }

    #[test]
    fn redelivered_reading_does_not_grow_the_series() {
        let once = ReadingSeries::merge(vec![at(0, 21.5)], ReadingSeries::default(), 250);
        let twice = ReadingSeries::merge(vec![at(0, 21.5)], once.clone(), 250);
        assert_eq!(once, twice);

        let different = ReadingSeries::merge(vec![at(0, 22.0)], twice, 250);
        assert_eq!(different.len(), 2);
        // fresh readings lead on equal timestamps
        assert_eq!(different.latest().map(|r| r.value), Some(22.0));
    }

    #[test]
    fn series_round_trips_through_json() {
        let series = ReadingSeries::from(vec![at(5, 22.0), at(0, 21.5)]);
        let raw = serde_json::to_vec(&series).unwrap();
        let back: ReadingSeries = serde_json::from_slice(&raw).unwrap();
        assert_eq!(series, back);

        let mut current = CurrentSnapshot::new();
        current.insert("A".into(), 0.1 + 0.2);
        current.insert("B".into(), -3.75);
        let raw = serde_json::to_vec(&current).unwrap();
        let back: CurrentSnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(current, back);
    }
}
