//! Next-entry inference for the multidose table.
//!
//! ## Inference rules
//!
//! Entries are read backwards from the trailing scratch entry:
//! `L` is the last complete entry, `M` the one before it, `E` the one before
//! `M`.
//!
//! - **Interval mode**: repeat `L` unchanged (same gap, dose and method).
//! - **Absolute mode**:
//!   1. **Alternation**: `L.dose == E.dose != M.dose` → continue the two-step
//!      pattern with `M`'s dose and method, spaced like `E → M`.
//!   2. **Linear trend**: `L.method == M.method` → extrapolate both the
//!      spacing and the dose change of `M → L`.
//!   3. Otherwise there is nothing to infer.

use crate::table::RegimenTable;
use crate::types::{ParsedEntry, TimeMode};

/// Predict the entry that should fill the scratch row.
///
/// Returns `None` when the table is too short or no pattern applies; that
/// is an expected outcome, not an error.
pub fn guess_next(table: &RegimenTable, mode: TimeMode) -> Option<ParsedEntry> {
    let entries = table.entries();
    let n = entries.len();

    match mode {
        TimeMode::Interval => {
            if n < 2 {
                return None;
            }
            let last = entries[n - 2].read()?;
            tracing::debug!("Interval mode: repeating last entry");
            Some(ParsedEntry::new(last.time, last.dose, last.method))
        }
        TimeMode::Absolute => {
            if n < 3 {
                return None;
            }
            let last = entries[n - 2].read()?;
            let middle = entries[n - 3].read()?;
            let earlier = if n >= 4 { entries[n - 4].read() } else { None };

            if let Some(earlier) = earlier {
                if let Some(guess) = alternation(&earlier, &middle, &last) {
                    return Some(guess);
                }
            }

            linear_trend(&middle, &last)
        }
    }
}

/// Rule 1: two dose levels alternating (e.g. a step taper)
fn alternation(e: &ParsedEntry, m: &ParsedEntry, l: &ParsedEntry) -> Option<ParsedEntry> {
    if l.dose != e.dose || l.dose == m.dose {
        return None;
    }
    let spacing = m.time.days_since(&e.time)?;
    let time = l.time.shifted_by(spacing)?;

    tracing::debug!("Alternating doses detected, next dose {}", m.dose);
    Some(ParsedEntry::new(time, m.dose, m.method))
}

/// Rule 2: same method, extrapolate spacing and dose change
fn linear_trend(m: &ParsedEntry, l: &ParsedEntry) -> Option<ParsedEntry> {
    if l.method != m.method {
        tracing::debug!("Method changed between last entries, no inference");
        return None;
    }
    let spacing = l.time.days_since(&m.time)?;
    let time = l.time.shifted_by(spacing)?;
    let dose = l.dose + (l.dose - m.dose);

    tracing::debug!("Linear trend: spacing {} days, dose {}", spacing, dose);
    Some(ParsedEntry::new(time, dose, l.method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeliveryMethod, EntryDraft, TableKind, TimeValue};

    fn table_with(rows: &[(TimeValue, f64, DeliveryMethod)]) -> RegimenTable {
        crate::logging::init_test();
        let mut table = RegimenTable::empty(TableKind::Multidose);
        for (time, dose, method) in rows {
            table.add_entry(Some(EntryDraft::new(time.clone(), *dose, *method)));
        }
        table.reconcile_scratch();
        table
    }

    const EV: DeliveryMethod = DeliveryMethod::EvIm;

    #[test]
    fn test_alternation() {
        let table = table_with(&[
            (TimeValue::Days(0.0), 2.0, EV),
            (TimeValue::Days(7.0), 1.0, EV),
            (TimeValue::Days(14.0), 2.0, EV),
        ]);
        let guess = guess_next(&table, TimeMode::Absolute).unwrap();
        assert_eq!(guess.time, TimeValue::Days(21.0));
        assert_eq!(guess.dose, 1.0);
        assert_eq!(guess.method, EV);
    }

    #[test]
    fn test_alternation_takes_middle_method() {
        let table = table_with(&[
            (TimeValue::Days(0.0), 2.0, EV),
            (TimeValue::Days(5.0), 1.0, DeliveryMethod::EcIm),
            (TimeValue::Days(14.0), 2.0, EV),
        ]);
        let guess = guess_next(&table, TimeMode::Absolute).unwrap();
        assert_eq!(guess.time, TimeValue::Days(19.0));
        assert_eq!(guess.method, DeliveryMethod::EcIm);
    }

    #[test]
    fn test_linear_trend() {
        let table = table_with(&[
            (TimeValue::Days(0.0), 1.0, EV),
            (TimeValue::Days(7.0), 1.5, EV),
        ]);
        let guess = guess_next(&table, TimeMode::Absolute).unwrap();
        assert_eq!(guess.time, TimeValue::Days(14.0));
        assert_eq!(guess.dose, 2.0);
        assert_eq!(guess.method, EV);
    }

    #[test]
    fn test_linear_trend_on_dates() {
        let table = table_with(&[
            (TimeValue::Date("2024-01-01".into()), 4.0, EV),
            (TimeValue::Date("2024-01-08".into()), 4.0, EV),
        ]);
        let guess = guess_next(&table, TimeMode::Absolute).unwrap();
        assert_eq!(guess.time, TimeValue::Date("2024-01-15".into()));
        assert_eq!(guess.dose, 4.0);
    }

    #[test]
    fn test_method_change_gives_up() {
        let table = table_with(&[
            (TimeValue::Days(0.0), 1.0, EV),
            (TimeValue::Days(7.0), 1.0, DeliveryMethod::EenIm),
        ]);
        assert!(guess_next(&table, TimeMode::Absolute).is_none());
    }

    #[test]
    fn test_mixed_time_kinds_give_up() {
        let table = table_with(&[
            (TimeValue::Date("2024-01-01".into()), 1.0, EV),
            (TimeValue::Days(7.0), 1.0, EV),
        ]);
        assert!(guess_next(&table, TimeMode::Absolute).is_none());
    }

    #[test]
    fn test_absolute_needs_two_entries() {
        let table = table_with(&[(TimeValue::Days(0.0), 1.0, EV)]);
        assert!(guess_next(&table, TimeMode::Absolute).is_none());
        assert!(guess_next(&RegimenTable::new(TableKind::Multidose), TimeMode::Absolute).is_none());
    }

    #[test]
    fn test_interval_mode_repeats_last_entry() {
        let table = table_with(&[(TimeValue::Days(7.0), 1.0, EV)]);
        let guess = guess_next(&table, TimeMode::Interval).unwrap();
        assert_eq!(guess, ParsedEntry::new(TimeValue::Days(7.0), 1.0, EV));
    }

    #[test]
    fn test_interval_mode_needs_valid_last_entry() {
        assert!(guess_next(&RegimenTable::new(TableKind::Multidose), TimeMode::Interval).is_none());
    }

    #[test]
    fn test_guess_fills_scratch_in_place() {
        let mut table = table_with(&[
            (TimeValue::Days(0.0), 1.0, EV),
            (TimeValue::Days(7.0), 1.5, EV),
        ]);
        let scratch = table.scratch_id().unwrap();
        let guess = guess_next(&table, TimeMode::Absolute).unwrap();

        table.fill_scratch(guess.into());

        let filled = table.get(scratch).unwrap().read().unwrap();
        assert_eq!(filled.time, TimeValue::Days(14.0));
        assert_eq!(filled.dose, 2.0);
        assert_eq!(table.len(), 4);
    }
}
