//! Built-in regimen presets.

use crate::state::RegimenState;
use crate::types::{DeliveryMethod, EntryDraft, TimeMode, TimeValue};
use once_cell::sync::Lazy;

/// One preset row: time (days), dose, method
pub type PresetRow = (f64, f64, DeliveryMethod);

#[derive(Clone, Debug, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub multidose: Vec<PresetRow>,
    pub steady_state: Vec<PresetRow>,
    pub cycle_overlay: bool,
    /// Multidose times are intervals between doses
    pub interval_days: bool,
}

static PRESETS: Lazy<Vec<Preset>> = Lazy::new(build_presets);

fn build_presets() -> Vec<Preset> {
    use DeliveryMethod::*;

    vec![
        Preset {
            name: "default",
            description: "A few common injection regimens at steady state, plus a loading schedule",
            multidose: vec![(0.0, 6.0, EvIm), (10.0, 5.0, EvIm), (20.0, 4.0, EvIm), (30.0, 4.0, EvIm)],
            steady_state: vec![(7.0, 4.0, EvIm), (7.0, 5.0, EenIm), (7.0, 5.0, EcIm)],
            cycle_overlay: false,
            interval_days: false,
        },
        Preset {
            name: "ev-weekly",
            description: "Estradiol valerate, 4mg every 7 days",
            multidose: vec![(0.0, 4.0, EvIm), (7.0, 4.0, EvIm), (7.0, 4.0, EvIm), (7.0, 4.0, EvIm)],
            steady_state: vec![(7.0, 4.0, EvIm)],
            cycle_overlay: false,
            interval_days: true,
        },
        Preset {
            name: "een-weekly",
            description: "Estradiol enanthate, 5mg every 7 days",
            multidose: vec![],
            steady_state: vec![(7.0, 5.0, EenIm)],
            cycle_overlay: false,
            interval_days: false,
        },
        Preset {
            name: "ec-weekly",
            description: "Estradiol cypionate, 5mg every 7 days",
            multidose: vec![],
            steady_state: vec![(7.0, 5.0, EcIm)],
            cycle_overlay: false,
            interval_days: false,
        },
        Preset {
            name: "eun-monthly",
            description: "Estradiol undecylate, 100mg every 30 days, intramuscular and subcutaneous",
            multidose: vec![],
            steady_state: vec![(30.0, 100.0, EunIm), (30.0, 100.0, EunCasubq)],
            cycle_overlay: false,
            interval_days: false,
        },
        Preset {
            name: "patch",
            description: "Transdermal patches at 0.1mg/day, twice- and once-weekly",
            multidose: vec![],
            steady_state: vec![(3.5, 0.1, PatchTw), (7.0, 0.1, PatchOw)],
            cycle_overlay: false,
            interval_days: false,
        },
        Preset {
            name: "cycle",
            description: "Estradiol valerate 4mg weekly over the menstrual cycle reference",
            multidose: vec![],
            steady_state: vec![(7.0, 4.0, EvIm)],
            cycle_overlay: true,
            interval_days: false,
        },
        Preset {
            name: "empty",
            description: "Blank tables",
            multidose: vec![],
            steady_state: vec![],
            cycle_overlay: false,
            interval_days: false,
        },
    ]
}

/// All presets, `default` first
pub fn all() -> &'static [Preset] {
    &PRESETS
}

/// Look up a preset by name (case-insensitive)
pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

/// The preset loaded at startup
pub fn default_preset() -> &'static Preset {
    &PRESETS[0]
}

/// Replace both tables with the preset's rows and adopt its options.
///
/// An empty row list leaves a single scratch entry.
pub fn apply_preset(state: &mut RegimenState, preset: &Preset) {
    state.options.cycle_overlay = preset.cycle_overlay;
    state.options.time_mode = if preset.interval_days {
        TimeMode::Interval
    } else {
        TimeMode::Absolute
    };

    for (table, rows) in [
        (&mut state.multidose, &preset.multidose),
        (&mut state.steady_state, &preset.steady_state),
    ] {
        table.clear();
        for &(time, dose, method) in rows {
            table.add_entry(Some(EntryDraft::new(TimeValue::Days(time), dose, method)));
        }
        table.reconcile_scratch();
    }

    tracing::info!("Applied preset {}", preset.name);
}
