//! Regimen state and the reducer that drives every mutation.
//!
//! The application state is a plain value: both tables, the display
//! options and the last user-facing notice. Each user action is an
//! [`Event`]; [`reduce`] maps the previous state and an event to the next
//! state, and [`needs_recompute`] decides whether the curve must be
//! redrawn by comparing the curve-relevant projection of the two.

use crate::autofill::guess_next;
use crate::curve::DisplayOptions;
use crate::presets::{apply_preset, Preset};
use crate::snapshot::{restore, RegimenSnapshot};
use crate::table::{EntryId, FieldEdit, RegimenTable};
use crate::timeline::guess_time_mode;
use crate::types::{
    ColorScheme, ConcentrationUnit, EntryDraft, ParsedEntry, TableKind, TimeMode, TimeValue,
};

/// Display and interpretation options
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    pub units: ConcentrationUnit,
    pub color_scheme: ColorScheme,
    pub time_mode: TimeMode,
    pub cycle_overlay: bool,
}

impl Options {
    /// Project into the options handed to the curve engine
    pub fn display(&self) -> DisplayOptions {
        DisplayOptions {
            concentration_unit_scale: self.units.scale(),
            color_scheme: self.color_scheme,
            display_as_intervals: self.time_mode == TimeMode::Interval,
            show_cycle_overlay: self.cycle_overlay,
        }
    }
}

/// Non-fatal outcome of the last event, for the user to see
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Autofill found no pattern to extend
    InferenceUnavailable,
    /// CSV import finished; `skipped` rows were rejected
    Imported { accepted: usize, skipped: usize },
    /// A restore source was empty or malformed
    RestoreMissed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegimenState {
    pub multidose: RegimenTable,
    pub steady_state: RegimenTable,
    pub options: Options,
    pub notice: Option<Notice>,
}

impl RegimenState {
    /// Both tables holding a single scratch entry, default options
    pub fn blank() -> Self {
        Self::new(Options::default())
    }

    pub fn new(options: Options) -> Self {
        Self {
            multidose: RegimenTable::new(TableKind::Multidose),
            steady_state: RegimenTable::new(TableKind::SteadyState),
            options,
            notice: None,
        }
    }

    pub fn table(&self, kind: TableKind) -> &RegimenTable {
        match kind {
            TableKind::Multidose => &self.multidose,
            TableKind::SteadyState => &self.steady_state,
        }
    }

    pub fn table_mut(&mut self, kind: TableKind) -> &mut RegimenTable {
        match kind {
            TableKind::Multidose => &mut self.multidose,
            TableKind::SteadyState => &mut self.steady_state,
        }
    }
}

/// A user action
#[derive(Clone, Debug)]
pub enum Event {
    Add {
        table: TableKind,
        draft: Option<EntryDraft>,
    },
    Remove {
        table: TableKind,
        id: EntryId,
    },
    Edit {
        table: TableKind,
        id: EntryId,
        edit: FieldEdit,
    },
    /// Overwrite the trailing scratch entry
    FillScratch {
        table: TableKind,
        draft: EntryDraft,
    },
    /// Clear a table down to one scratch entry
    Clear {
        table: TableKind,
    },
    /// Predict the next multidose entry into the scratch entry
    Autofill,
    SetTimeMode(TimeMode),
    SetUnits(ConcentrationUnit),
    SetColorScheme(ColorScheme),
    SetCycleOverlay(bool),
    ApplyPreset(&'static Preset),
    /// Replace the multidose table with imported rows
    Import {
        drafts: Vec<EntryDraft>,
        skipped: usize,
    },
    Restore(RegimenSnapshot),
}

/// Compute the state that follows `event`.
pub fn reduce(state: &RegimenState, event: Event) -> RegimenState {
    let mut next = state.clone();
    next.notice = None;

    match event {
        Event::Add { table, draft } => {
            let table = next.table_mut(table);
            match draft {
                Some(draft) => {
                    table.insert_entry(draft);
                }
                None => {
                    table.add_entry(None);
                    table.reconcile_scratch();
                }
            }
        }
        Event::Remove { table, id } => {
            if !next.table_mut(table).remove_entry(id) {
                tracing::debug!("No entry {} to remove", id);
            }
        }
        Event::Edit { table, id, edit } => {
            if next.table_mut(table).edit(id, edit).is_none() {
                tracing::debug!("No entry {} to edit", id);
            }
        }
        Event::FillScratch { table, draft } => {
            next.table_mut(table).fill_scratch(draft);
        }
        Event::Clear { table } => next.table_mut(table).reset(),
        Event::Autofill => match guess_next(&next.multidose, next.options.time_mode) {
            Some(guess) => {
                next.multidose.fill_scratch(guess.into());
            }
            None => {
                tracing::debug!("Autofill found no pattern");
                next.notice = Some(Notice::InferenceUnavailable);
            }
        },
        Event::SetTimeMode(mode) => next.options.time_mode = mode,
        Event::SetUnits(units) => next.options.units = units,
        Event::SetColorScheme(scheme) => next.options.color_scheme = scheme,
        Event::SetCycleOverlay(on) => next.options.cycle_overlay = on,
        Event::ApplyPreset(preset) => apply_preset(&mut next, preset),
        Event::Import { drafts, skipped } => {
            let accepted = drafts.len();
            let table = &mut next.multidose;
            table.clear();
            for draft in drafts {
                table.add_entry(Some(draft));
            }
            table.reconcile_scratch();

            let times: Vec<TimeValue> = table.valid_entries().into_iter().map(|e| e.time).collect();
            next.options.time_mode = guess_time_mode(&times);

            tracing::info!("Imported {} entries, skipped {}", accepted, skipped);
            next.notice = Some(Notice::Imported { accepted, skipped });
        }
        Event::Restore(snapshot) => {
            if !restore(&mut next, &snapshot) {
                next.notice = Some(Notice::RestoreMissed);
            }
        }
    }

    next
}

type TableProjection = (Vec<ParsedEntry>, (bool, bool));

fn curve_projection(state: &RegimenState) -> (TableProjection, Vec<ParsedEntry>, &Options) {
    (
        (
            state.multidose.valid_entries(),
            state.multidose.table_flags(),
        ),
        state.steady_state.valid_entries(),
        &state.options,
    )
}

/// Whether the curve drawn for `prev` is stale for `next`.
///
/// Keystrokes on an entry that stays incomplete leave the projection
/// untouched and need no redraw.
pub fn needs_recompute(prev: &RegimenState, next: &RegimenState) -> bool {
    curve_projection(prev) != curve_projection(next)
}
