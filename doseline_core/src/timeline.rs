//! Time normalization and chronological ordering.
//!
//! Calendar dates and numeric day offsets are mapped into one coordinate
//! space: days relative to the earliest anchor event. The anchor is found by a
//! single left-to-right reduction seeded at `now`; it is not a global
//! fixed point, so a numeric entry that precedes an earlier calendar entry is
//! resolved against the anchor known at that point of the scan.

use crate::types::{days_to_delta, TimeMode, TimeValue, MILLIS_PER_DAY};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A normalized time value
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    /// Days relative to the anchor (numeric entries pass through unchanged)
    Offset(f64),
    /// A date string that could not be parsed, passed through untouched
    Unresolved(String),
}

impl Resolved {
    pub fn offset(&self) -> Option<f64> {
        match self {
            Resolved::Offset(days) => Some(*days),
            Resolved::Unresolved(_) => None,
        }
    }
}

/// Earliest anchor instant of a table, scanning entries in stored order.
pub fn find_earliest_anchor(times: &[TimeValue], now: DateTime<Utc>) -> DateTime<Utc> {
    times.iter().fold(now, |anchor, time| {
        let candidate = match time {
            TimeValue::Date(_) => time.calendar(),
            TimeValue::Days(days) => {
                days_to_delta(*days).and_then(|delta| anchor.checked_add_signed(delta))
            }
        };
        match candidate {
            Some(candidate) if candidate < anchor => candidate,
            _ => anchor,
        }
    })
}

/// Map every time value to a day offset from the table's anchor.
pub fn to_day_offsets(times: &[TimeValue], now: DateTime<Utc>) -> Vec<Resolved> {
    let anchor = find_earliest_anchor(times, now);
    times
        .iter()
        .map(|time| match time {
            TimeValue::Days(days) => Resolved::Offset(*days),
            TimeValue::Date(raw) => match time.calendar() {
                Some(date) => {
                    Resolved::Offset((date - anchor).num_milliseconds() as f64 / MILLIS_PER_DAY)
                }
                None => {
                    tracing::debug!("Time value {:?} left unresolved", raw);
                    Resolved::Unresolved(raw.clone())
                }
            },
        })
        .collect()
}

/// Chronological ordering of `times` as a permutation of their indices.
///
/// Stable: equal offsets keep their insertion order. Unresolved values sort
/// after every resolved one. The input is never reordered.
///
/// The anchor comes from a left-to-right scan, so sorting an already sorted
/// list is a no-op only when all times are of one kind (all day offsets or
/// all dates). Mixed lists can move again on a second sort.
pub fn sort_by_resolved_offset(times: &[TimeValue], now: DateTime<Utc>) -> Vec<usize> {
    let offsets = to_day_offsets(times, now);
    let mut order: Vec<usize> = (0..times.len()).collect();

    let plain: Option<Vec<f64>> = offsets.iter().map(Resolved::offset).collect();
    if plain.as_deref().is_some_and(is_sorted) {
        return order;
    }

    order.sort_by(|&a, &b| compare_resolved(&offsets[a], &offsets[b]));
    order
}

fn compare_resolved(a: &Resolved, b: &Resolved) -> Ordering {
    match (a.offset(), b.offset()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Non-decreasing check
pub fn is_sorted(offsets: &[f64]) -> bool {
    offsets.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Running totals of interval-mode deltas: absolute offsets from the first
/// entry's position.
pub fn accumulate_intervals(deltas: &[f64]) -> Vec<f64> {
    deltas
        .iter()
        .scan(0.0, |total, delta| {
            *total += delta;
            Some(*total)
        })
        .collect()
}

/// Guess how a list of times was meant: all-distinct values read as
/// absolute offsets, any repetition suggests intervals.
pub fn guess_time_mode(times: &[TimeValue]) -> TimeMode {
    let all_unique = times
        .iter()
        .enumerate()
        .all(|(i, t)| !times[..i].contains(t));

    if all_unique {
        TimeMode::Absolute
    } else {
        TimeMode::Interval
    }
}
