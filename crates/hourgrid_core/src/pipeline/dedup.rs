//! Exact-record and timestamp-level deduplication.
//!
//! # Invariants
//! - Output timestamps are unique; input order is preserved.
//! - Among records sharing a timestamp the first seen is kept.
//! - Running the deduplicator on its own output is a no-op.

use crate::model::observation::Observation;
use chrono::NaiveDateTime;
use log::warn;
use std::collections::HashMap;

/// Deduplicated records plus what was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub observations: Vec<Observation>,
    /// Records field-for-field identical to an earlier record.
    pub exact_duplicates: usize,
    /// Records discarded because an earlier, different record owns the timestamp.
    pub conflicting_records: usize,
    /// Timestamps with at least one materially different later record.
    pub timestamp_conflicts: Vec<NaiveDateTime>,
}

/// Removes exact duplicates, then collapses shared timestamps first-seen-wins.
pub fn deduplicate(raw: Vec<Observation>) -> DedupOutcome {
    // Distinct records seen so far per timestamp; the first is the one kept.
    let mut seen: HashMap<NaiveDateTime, Vec<Observation>> = HashMap::new();
    let mut observations = Vec::with_capacity(raw.len());
    let mut exact_duplicates = 0;
    let mut conflicting_records = 0;
    let mut timestamp_conflicts = Vec::new();

    for observation in raw {
        let variants = seen.entry(observation.timestamp).or_default();
        if variants.contains(&observation) {
            exact_duplicates += 1;
            continue;
        }

        if variants.is_empty() {
            variants.push(observation.clone());
            observations.push(observation);
            continue;
        }

        if variants.len() == 1 {
            warn!(
                "event=duplicate_timestamp module=dedup status=resolved policy=first_seen timestamp={}",
                observation.timestamp
            );
            timestamp_conflicts.push(observation.timestamp);
        }
        conflicting_records += 1;
        variants.push(observation);
    }

    DedupOutcome {
        observations,
        exact_duplicates,
        conflicting_records,
        timestamp_conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::deduplicate;
    use crate::model::observation::{FieldValue, Observation};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn obs(hour: u32, volume: f64) -> Observation {
        Observation::new(at(hour), vec![Some(FieldValue::Numeric(volume))])
    }

    #[test]
    fn identical_rows_collapse_to_one() {
        let outcome = deduplicate(vec![obs(3, 10.0), obs(3, 10.0)]);
        assert_eq!(outcome.observations, vec![obs(3, 10.0)]);
        assert_eq!(outcome.exact_duplicates, 1);
        assert!(outcome.timestamp_conflicts.is_empty());
    }

    #[test]
    fn conflicting_rows_keep_first_seen() {
        let outcome = deduplicate(vec![obs(1, 1.0), obs(2, 2.0), obs(1, 9.0), obs(1, 8.0)]);
        assert_eq!(outcome.observations, vec![obs(1, 1.0), obs(2, 2.0)]);
        assert_eq!(outcome.exact_duplicates, 0);
        assert_eq!(outcome.conflicting_records, 2);
        assert_eq!(outcome.timestamp_conflicts, vec![at(1)]);
    }

    #[test]
    fn duplicate_of_discarded_variant_counts_as_exact() {
        let outcome = deduplicate(vec![obs(1, 1.0), obs(1, 9.0), obs(1, 9.0)]);
        assert_eq!(outcome.observations, vec![obs(1, 1.0)]);
        assert_eq!(outcome.exact_duplicates, 1);
        assert_eq!(outcome.timestamp_conflicts, vec![at(1)]);
    }
}
