//! Spot memory: pattern statistics plus summary figures for one spot.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use twinsync_types::CheckRecord;

use crate::patterns::{PatternAnalyzer, SpotPatterns};

/// Snapshot of what the history of a spot says about it.
///
/// A pure function of the record window it was computed from; rebuilt on
/// every read and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotMemory {
    pub patterns: SpotPatterns,
    /// Number of records in the window.
    pub total_checks: usize,
    /// Percentage of passing records in `0.0..=100.0`.
    pub pass_rate: f64,
    /// When this snapshot was computed.
    #[serde(skip_serializing)]
    pub last_updated: DateTime<Utc>,
}

/// Builds [`SpotMemory`] snapshots from check records.
///
/// The aggregator does not truncate its input; the caller supplies the
/// bounded window (see [`MEMORY_WINDOW`][crate::store::MEMORY_WINDOW]).
#[derive(Debug, Clone)]
pub struct MemoryAggregator<Tz: TimeZone = Local> {
    analyzer: PatternAnalyzer<Tz>,
}

impl MemoryAggregator<Local> {
    pub fn local() -> Self {
        Self {
            analyzer: PatternAnalyzer::local(),
        }
    }
}

impl Default for MemoryAggregator<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> MemoryAggregator<Tz> {
    pub fn new(analyzer: PatternAnalyzer<Tz>) -> Self {
        Self { analyzer }
    }

    /// Aggregate `records` as of now.
    ///
    /// Returns `None` for an empty history: "never checked" is distinct from
    /// "checked, zero streak".
    pub fn aggregate(&self, records: &[CheckRecord]) -> Option<SpotMemory> {
        self.aggregate_at(records, Utc::now())
    }

    /// Aggregate `records`, stamping the snapshot with `now`.
    pub fn aggregate_at(&self, records: &[CheckRecord], now: DateTime<Utc>) -> Option<SpotMemory> {
        if records.is_empty() {
            return None;
        }

        let total_checks = records.len();
        let passed = records.iter().filter(|r| r.passed()).count();

        Some(SpotMemory {
            patterns: self.analyzer.analyze(records),
            total_checks,
            pass_rate: passed as f64 / total_checks as f64 * 100.0,
            last_updated: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinsync_types::SpotStatus;

    fn aggregator() -> MemoryAggregator<Utc> {
        MemoryAggregator::new(PatternAnalyzer::new(Utc))
    }

    fn records(statuses: &[SpotStatus]) -> Vec<CheckRecord> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| CheckRecord {
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1 + i as u32, 9, 0, 0).unwrap(),
                status: *status,
                score: if *status == SpotStatus::Pass { 90 } else { 30 },
                feedback: String::new(),
                items_to_sort: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn empty_history_has_no_memory() {
        assert!(aggregator().aggregate(&[]).is_none());
    }

    #[test]
    fn pass_rate_is_percentage_of_passes() {
        use SpotStatus::*;
        let memory = aggregator()
            .aggregate(&records(&[Pass, Fail, Pass, Unknown]))
            .unwrap();
        assert_eq!(memory.total_checks, 4);
        assert!((memory.pass_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pass_rate_stays_within_bounds() {
        use SpotStatus::*;
        for statuses in [&[Pass, Pass][..], &[Fail][..], &[Pass, Fail, Fail][..]] {
            let recs = records(statuses);
            let passes = statuses.iter().filter(|s| **s == Pass).count();
            let memory = aggregator().aggregate(&recs).unwrap();
            let expected = 100.0 * passes as f64 / statuses.len() as f64;
            assert!((memory.pass_rate - expected).abs() < 1e-9);
            assert!((0.0..=100.0).contains(&memory.pass_rate));
        }
    }

    #[test]
    fn last_updated_is_the_aggregation_instant() {
        let now = Utc.with_ymd_and_hms(2030, 6, 15, 8, 30, 0).unwrap();
        let memory = aggregator()
            .aggregate_at(&records(&[SpotStatus::Pass]), now)
            .unwrap();
        assert_eq!(memory.last_updated, now);
    }

    #[test]
    fn memory_wraps_analyzer_patterns() {
        use SpotStatus::*;
        let recs = records(&[Fail, Pass, Pass]);
        let memory = aggregator().aggregate(&recs).unwrap();
        assert_eq!(memory.patterns, PatternAnalyzer::new(Utc).analyze(&recs));
        assert_eq!(memory.patterns.current_streak, 2);
    }
}
