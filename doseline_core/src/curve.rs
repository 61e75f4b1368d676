//! Curve Engine seam.
//!
//! Concentration modelling and plotting live outside this crate. The engine
//! receives normalized dose events plus display options and returns whatever
//! artifact it renders.

use crate::state::RegimenState;
use crate::timeline::{sort_by_resolved_offset, to_day_offsets};
use crate::types::{ColorScheme, DeliveryMethod, TimeMode, TimeValue};
use chrono::{DateTime, Utc};

/// One dose event in curve coordinates
#[derive(Clone, Debug, PartialEq)]
pub struct DoseEvent {
    pub day_offset: f64,
    pub dose: f64,
    pub method: DeliveryMethod,
}

/// The multidose regimen, with its table-level flags
#[derive(Clone, Debug, PartialEq)]
pub struct MultidoseCurve {
    pub events: Vec<DoseEvent>,
    pub curve_visible: bool,
    pub uncertainty_visible: bool,
}

/// One repeating regimen; `event.day_offset` is the dosing period
#[derive(Clone, Debug, PartialEq)]
pub struct SteadyStateCurve {
    pub event: DoseEvent,
    pub curve_visible: bool,
    pub uncertainty_visible: bool,
}

/// Options the engine needs to draw
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayOptions {
    pub concentration_unit_scale: f64,
    pub color_scheme: ColorScheme,
    pub display_as_intervals: bool,
    pub show_cycle_overlay: bool,
}

/// Everything the engine consumes for one render
#[derive(Clone, Debug, PartialEq)]
pub struct CurveInput {
    pub multidose: MultidoseCurve,
    pub steady_states: Vec<SteadyStateCurve>,
    pub options: DisplayOptions,
}

/// A curve renderer
pub trait CurveEngine {
    type Artifact;

    fn render(&self, input: &CurveInput) -> Self::Artifact;
}

/// Project the reducer state into curve input.
///
/// Only valid entries are used. In absolute mode multidose events are
/// normalized against the earliest anchor and sorted; in interval mode they
/// keep stored order and their raw deltas, and `display_as_intervals` tells
/// the engine to accumulate them.
pub fn build_curve_input(state: &RegimenState, now: DateTime<Utc>) -> CurveInput {
    let parsed = state.multidose.valid_entries();
    let times: Vec<TimeValue> = parsed.iter().map(|e| e.time.clone()).collect();
    let offsets = to_day_offsets(&times, now);

    let order: Vec<usize> = match state.options.time_mode {
        TimeMode::Absolute => sort_by_resolved_offset(&times, now),
        TimeMode::Interval => (0..parsed.len()).collect(),
    };

    let events = order
        .into_iter()
        .filter_map(|i| {
            let day_offset = offsets[i].offset()?;
            Some(DoseEvent {
                day_offset,
                dose: parsed[i].dose,
                method: parsed[i].method,
            })
        })
        .collect();

    let (curve_visible, uncertainty_visible) = state.multidose.table_flags();

    let steady_states = state
        .steady_state
        .valid_entries()
        .into_iter()
        .filter_map(|entry| {
            // a steady-state period must be a plain number of days
            let period = entry.time.as_days()?;
            Some(SteadyStateCurve {
                event: DoseEvent {
                    day_offset: period,
                    dose: entry.dose,
                    method: entry.method,
                },
                curve_visible: entry.curve_visible.unwrap_or(true),
                uncertainty_visible: entry.uncertainty_visible.unwrap_or(true),
            })
        })
        .collect();

    CurveInput {
        multidose: MultidoseCurve {
            events,
            curve_visible,
            uncertainty_visible,
        },
        steady_states,
        options: state.options.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{reduce, Event};
    use crate::table::FieldEdit;
    use crate::types::{EntryDraft, TableKind};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn state_with(rows: &[(&str, f64)], mode: TimeMode) -> RegimenState {
        let mut state = RegimenState::blank();
        state.options.time_mode = mode;
        state.multidose.clear();
        for (time, dose) in rows {
            let time = TimeValue::parse(time).unwrap();
            state
                .multidose
                .add_entry(Some(EntryDraft::new(time, *dose, DeliveryMethod::EvIm)));
        }
        state.multidose.reconcile_scratch();
        state
    }

    #[test]
    fn test_absolute_mode_sorts_and_normalizes() {
        let state = state_with(
            &[("2024-01-17", 2.0), ("2024-01-03", 1.0), ("7", 3.0)],
            TimeMode::Absolute,
        );
        let input = build_curve_input(&state, now());
        let offsets: Vec<f64> = input.multidose.events.iter().map(|e| e.day_offset).collect();
        assert_eq!(offsets, vec![0.0, 7.0, 14.0]);
        let doses: Vec<f64> = input.multidose.events.iter().map(|e| e.dose).collect();
        assert_eq!(doses, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_interval_mode_keeps_stored_order() {
        let state = state_with(&[("0", 1.0), ("7", 1.0), ("3", 1.0)], TimeMode::Interval);
        let input = build_curve_input(&state, now());
        let offsets: Vec<f64> = input.multidose.events.iter().map(|e| e.day_offset).collect();
        assert_eq!(offsets, vec![0.0, 7.0, 3.0]);
        assert!(input.options.display_as_intervals);
    }

    #[test]
    fn test_incomplete_entries_are_skipped() {
        let state = state_with(&[("0", 1.0)], TimeMode::Absolute);
        // scratch entry is present but not part of the curve
        assert_eq!(state.multidose.len(), 2);
        let input = build_curve_input(&state, now());
        assert_eq!(input.multidose.events.len(), 1);
    }

    #[test]
    fn test_steady_state_flags_are_independent() {
        let mut state = RegimenState::blank();
        state.steady_state.clear();
        state.steady_state.add_entry(Some(
            EntryDraft::new(TimeValue::Days(7.0), 4.0, DeliveryMethod::EvIm).with_flags(true, false),
        ));
        state.steady_state.add_entry(Some(
            EntryDraft::new(TimeValue::Days(10.0), 6.0, DeliveryMethod::EenIm)
                .with_flags(false, true),
        ));
        state.steady_state.reconcile_scratch();

        let input = build_curve_input(&state, now());
        assert_eq!(input.steady_states.len(), 2);
        assert!(input.steady_states[0].curve_visible);
        assert!(!input.steady_states[0].uncertainty_visible);
        assert!(!input.steady_states[1].curve_visible);
        assert_eq!(input.steady_states[1].event.day_offset, 10.0);
    }

    #[test]
    fn test_multidose_flags_come_from_first_entry() {
        let state = state_with(&[("0", 1.0), ("7", 1.0)], TimeMode::Absolute);
        let id = state.multidose.entries()[1].id;
        let state = reduce(
            &state,
            Event::Edit {
                table: TableKind::Multidose,
                id,
                edit: FieldEdit::CurveVisible(false),
            },
        );
        let input = build_curve_input(&state, now());
        assert!(!input.multidose.curve_visible);
        assert!(input.multidose.uncertainty_visible);
    }
}
