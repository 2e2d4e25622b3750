//! Pattern detection over a spot's check history.
//!
//! [`PatternAnalyzer::analyze`] is a pure function of the record slice it is
//! given: it performs no I/O and keeps no state between calls.
//!
//! # Rules
//!
//! * **Recurring items** – item names are case-folded and counted across all
//!   records.  The five most frequent names are kept if they were seen more
//!   than once, most frequent first.  Equal counts keep the order in which
//!   the names were first encountered in the input.
//! * **Best / worst day** – records are grouped by the weekday of their
//!   timestamp in the analyzer's time zone and the mean score of each group
//!   is compared.  Equal means resolve to the earliest weekday, Monday first.
//! * **Streaks** – records are stable-sorted by timestamp.  `best_streak` is
//!   the longest run of consecutive passes; `current_streak` is the run that
//!   ends at the most recent record.
//!
//! # Example
//!
//! ```rust
//! use twinsync_memory::patterns::PatternAnalyzer;
//!
//! let patterns = PatternAnalyzer::local().analyze(&[]);
//! assert!(patterns.recurring_items.is_empty());
//! assert_eq!(patterns.best_streak, 0);
//! ```

use std::collections::HashMap;

use chrono::{Datelike, Local, TimeZone, Weekday};
use serde::{Serialize, Serializer};
use twinsync_types::CheckRecord;

/// How many of the most frequent item names are considered for recurrence.
const RECURRING_CANDIDATES: usize = 5;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Full English name of `day`, e.g. `"Wednesday"`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn serialize_weekday<S: Serializer>(day: &Option<Weekday>, s: S) -> Result<S::Ok, S::Error> {
    match day {
        Some(d) => s.serialize_some(weekday_name(*d)),
        None => s.serialize_none(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotPatterns
// ─────────────────────────────────────────────────────────────────────────────

/// Behavioural statistics derived from a window of check records.
///
/// Recomputed on every read; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpotPatterns {
    /// Case-folded item names seen more than once, most frequent first (≤ 5).
    pub recurring_items: Vec<String>,
    /// Weekday with the highest mean score.
    #[serde(serialize_with = "serialize_weekday")]
    pub best_day: Option<Weekday>,
    /// Weekday with the lowest mean score.
    #[serde(serialize_with = "serialize_weekday")]
    pub worst_day: Option<Weekday>,
    /// Consecutive passes ending at the most recent record.
    pub current_streak: u32,
    /// Longest run of consecutive passes in the window.
    pub best_streak: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// PatternAnalyzer
// ─────────────────────────────────────────────────────────────────────────────

/// Computes [`SpotPatterns`] from check records.
///
/// The time zone decides which calendar day a timestamp falls on; production
/// code uses [`PatternAnalyzer::local`].
#[derive(Debug, Clone)]
pub struct PatternAnalyzer<Tz: TimeZone = Local> {
    tz: Tz,
}

impl PatternAnalyzer<Local> {
    /// Analyzer bucketing weekdays in the host's local time zone.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl Default for PatternAnalyzer<Local> {
    fn default() -> Self {
        Self::local()
    }
}

impl<Tz: TimeZone> PatternAnalyzer<Tz> {
    /// Analyzer bucketing weekdays in `tz`.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Derive [`SpotPatterns`] from `records`, given in any order.
    ///
    /// An empty slice yields [`SpotPatterns::default`].
    pub fn analyze(&self, records: &[CheckRecord]) -> SpotPatterns {
        if records.is_empty() {
            return SpotPatterns::default();
        }

        let (best_day, worst_day) = self.best_and_worst_day(records);
        let (current_streak, best_streak) = streaks(records);

        SpotPatterns {
            recurring_items: recurring_items(records),
            best_day,
            worst_day,
            current_streak,
            best_streak,
        }
    }

    fn best_and_worst_day(&self, records: &[CheckRecord]) -> (Option<Weekday>, Option<Weekday>) {
        // (score sum, record count) per weekday, Monday first.
        let mut totals = [(0u64, 0u64); 7];
        for record in records {
            let day = record.timestamp.with_timezone(&self.tz).weekday();
            let slot = &mut totals[day.num_days_from_monday() as usize];
            slot.0 += u64::from(record.score);
            slot.1 += 1;
        }

        let mut best: Option<(Weekday, f64)> = None;
        let mut worst: Option<(Weekday, f64)> = None;
        for (day, (sum, count)) in WEEK.into_iter().zip(totals) {
            if count == 0 {
                continue;
            }
            let mean = sum as f64 / count as f64;
            // Strict comparisons keep the earlier weekday on ties.
            if best.is_none_or(|(_, b)| mean > b) {
                best = Some((day, mean));
            }
            if worst.is_none_or(|(_, w)| mean < w) {
                worst = Some((day, mean));
            }
        }

        (best.map(|(d, _)| d), worst.map(|(d, _)| d))
    }
}

fn recurring_items(records: &[CheckRecord]) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in records.iter().flat_map(|r| &r.items_to_sort) {
        let name = item.name.to_lowercase();
        match index.get(&name) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(name.clone(), counts.len());
                counts.push((name, 1));
            }
        }
    }

    // Stable: equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(RECURRING_CANDIDATES)
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name)
        .collect()
}

/// Returns `(current_streak, best_streak)`.
fn streaks(records: &[CheckRecord]) -> (u32, u32) {
    let mut ordered: Vec<&CheckRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut run = 0u32;
    let mut best = 0u32;
    for record in ordered {
        if record.passed() {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    // After the scan `run` is the trailing pass run.
    (run, best)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use twinsync_types::{SpotStatus, ToSortItem};

    /// Noon UTC on 2024-01-(1 + offset); 2024-01-01 is a Monday.
    fn day(offset: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1 + offset, 12, 0, 0).unwrap()
    }

    fn record(ts: DateTime<Utc>, score: u8, status: SpotStatus, items: &[&str]) -> CheckRecord {
        CheckRecord {
            timestamp: ts,
            status,
            score,
            feedback: String::new(),
            items_to_sort: items
                .iter()
                .map(|n| ToSortItem {
                    name: n.to_string(),
                    location: "counter".into(),
                    suggestion: "put away".into(),
                })
                .collect(),
        }
    }

    fn analyzer() -> PatternAnalyzer<Utc> {
        PatternAnalyzer::new(Utc)
    }

    // ── empty input ──────────────────────────────────────────────────────────

    #[test]
    fn empty_history_yields_default_patterns() {
        let p = analyzer().analyze(&[]);
        assert_eq!(p, SpotPatterns::default());
        assert!(p.best_day.is_none());
        assert!(p.worst_day.is_none());
    }

    // ── weekday scenario ─────────────────────────────────────────────────────

    #[test]
    fn weekly_scenario_streaks_and_days() {
        let records = vec![
            record(day(0), 80, SpotStatus::Pass, &[]),
            record(day(1), 40, SpotStatus::Fail, &[]),
            record(day(2), 90, SpotStatus::Pass, &[]),
            record(day(3), 90, SpotStatus::Pass, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.best_streak, 2);
        assert_eq!(p.current_streak, 2);
        // Wednesday and Thursday tie; the earlier weekday wins.
        assert_eq!(p.best_day, Some(Weekday::Wed));
        assert_eq!(p.worst_day, Some(Weekday::Tue));
    }

    #[test]
    fn weekday_means_average_multiple_records() {
        // Two Mondays (50, 100 → 75) against one Friday (70).
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &[]),
            record(day(7), 100, SpotStatus::Pass, &[]),
            record(day(4), 70, SpotStatus::Pass, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.best_day, Some(Weekday::Mon));
        assert_eq!(p.worst_day, Some(Weekday::Fri));
    }

    #[test]
    fn single_weekday_is_both_best_and_worst() {
        let p = analyzer().analyze(&[record(day(5), 10, SpotStatus::Fail, &[])]);
        assert_eq!(p.best_day, Some(Weekday::Sat));
        assert_eq!(p.worst_day, Some(Weekday::Sat));
    }

    #[test]
    fn worst_day_tie_picks_earliest_weekday() {
        let records = vec![
            record(day(6), 20, SpotStatus::Fail, &[]),
            record(day(2), 20, SpotStatus::Fail, &[]),
            record(day(4), 60, SpotStatus::Pass, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.worst_day, Some(Weekday::Wed));
        assert_eq!(p.best_day, Some(Weekday::Fri));
    }

    #[test]
    fn weekday_follows_analyzer_time_zone() {
        use chrono::FixedOffset;
        // 23:00 UTC on Monday is already Tuesday at UTC+2.
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        let records = vec![record(ts, 50, SpotStatus::Pass, &[])];
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(analyzer().analyze(&records).best_day, Some(Weekday::Mon));
        assert_eq!(
            PatternAnalyzer::new(east).analyze(&records).best_day,
            Some(Weekday::Tue)
        );
    }

    // ── streaks ──────────────────────────────────────────────────────────────

    #[test]
    fn single_pass_has_streak_of_one() {
        let p = analyzer().analyze(&[record(day(0), 95, SpotStatus::Pass, &[])]);
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.best_streak, 1);
    }

    #[test]
    fn no_passes_means_zero_streaks() {
        let records = vec![
            record(day(0), 10, SpotStatus::Fail, &[]),
            record(day(1), 0, SpotStatus::Unknown, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.current_streak, 0);
        assert_eq!(p.best_streak, 0);
    }

    #[test]
    fn unknown_status_breaks_a_streak() {
        let records = vec![
            record(day(0), 90, SpotStatus::Pass, &[]),
            record(day(1), 90, SpotStatus::Pass, &[]),
            record(day(2), 0, SpotStatus::Unknown, &[]),
            record(day(3), 90, SpotStatus::Pass, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.best_streak, 2);
        assert_eq!(p.current_streak, 1);
    }

    #[test]
    fn streaks_sort_by_timestamp_not_input_order() {
        // Most-recent-first, as the store supplies them.
        let records = vec![
            record(day(3), 20, SpotStatus::Fail, &[]),
            record(day(2), 90, SpotStatus::Pass, &[]),
            record(day(1), 90, SpotStatus::Pass, &[]),
            record(day(0), 90, SpotStatus::Pass, &[]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.best_streak, 3);
        assert_eq!(p.current_streak, 0);
    }

    #[test]
    fn current_streak_never_exceeds_best_streak() {
        use SpotStatus::*;
        let sequences: [&[SpotStatus]; 5] = [
            &[Pass, Pass, Fail, Pass],
            &[Fail, Pass, Pass, Pass],
            &[Pass, Fail, Pass, Pass, Fail],
            &[Unknown, Unknown],
            &[Pass, Pass, Pass, Pass, Pass, Pass],
        ];
        for seq in sequences {
            let records: Vec<_> = seq
                .iter()
                .enumerate()
                .map(|(i, s)| record(day(i as u32), 50, *s, &[]))
                .collect();
            let p = analyzer().analyze(&records);
            assert!(p.current_streak <= p.best_streak, "{seq:?}");
        }
    }

    // ── recurring items ──────────────────────────────────────────────────────

    #[test]
    fn recurring_items_ranked_by_frequency() {
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &["sponge", "sponge"]),
            record(day(1), 50, SpotStatus::Fail, &["mug", "sponge"]),
            record(day(2), 50, SpotStatus::Fail, &["plate", "plate"]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.recurring_items, vec!["sponge", "plate"]);
    }

    #[test]
    fn recurring_items_are_case_folded() {
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &["Coffee Mug"]),
            record(day(1), 50, SpotStatus::Fail, &["coffee mug"]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.recurring_items, vec!["coffee mug"]);
    }

    #[test]
    fn recurring_ties_keep_first_seen_order() {
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &["keys", "wallet"]),
            record(day(1), 50, SpotStatus::Fail, &["wallet", "keys"]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.recurring_items, vec!["keys", "wallet"]);
    }

    #[test]
    fn recurring_items_capped_at_five() {
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &names),
            record(day(1), 50, SpotStatus::Fail, &names),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.recurring_items, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn singletons_in_top_five_are_dropped_not_replaced() {
        // Five names appear once before the only repeated one; it is still
        // ranked first because it has the highest count.
        let records = vec![
            record(day(0), 50, SpotStatus::Fail, &["a", "b", "c", "d", "e"]),
            record(day(1), 50, SpotStatus::Fail, &["z", "z"]),
        ];
        let p = analyzer().analyze(&records);
        assert_eq!(p.recurring_items, vec!["z"]);
    }

    // ── idempotence & serialisation ──────────────────────────────────────────

    #[test]
    fn analysis_is_idempotent() {
        let records = vec![
            record(day(0), 80, SpotStatus::Pass, &["towel", "towel"]),
            record(day(1), 30, SpotStatus::Fail, &["towel"]),
            record(day(2), 90, SpotStatus::Pass, &[]),
        ];
        let a = analyzer();
        assert_eq!(a.analyze(&records), a.analyze(&records));
    }

    #[test]
    fn weekdays_serialize_as_full_names() {
        let p = SpotPatterns {
            best_day: Some(Weekday::Thu),
            ..Default::default()
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["best_day"], "Thursday");
        assert!(json["worst_day"].is_null());
    }
}
