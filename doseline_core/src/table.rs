//! Regimen tables: ordered dose entries with validity tracking.
//!
//! A table always ends in one "scratch" entry that is invalid and receives new
//! input. When the last entry becomes valid a fresh scratch entry is appended;
//! a blank trailing entry behind another invalid entry is dropped again.

use crate::types::{parse_finite, DeliveryMethod, EntryDraft, ParsedEntry, TableKind, TimeValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an entry within its table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One row of a regimen table, holding the raw input text
#[derive(Clone, Debug, PartialEq)]
pub struct DoseEntry {
    pub id: EntryId,
    pub time: String,
    pub dose: String,
    pub method: DeliveryMethod,
    pub curve_visible: Option<bool>,
    pub uncertainty_visible: Option<bool>,
    /// Last computed validity, kept in sync by every mutation
    pub valid: bool,
}

impl DoseEntry {
    /// Parse the entry if it is complete: resolvable time and dose > 0.
    pub fn read(&self) -> Option<ParsedEntry> {
        let time = TimeValue::parse(&self.time)?;
        let dose = parse_finite(&self.dose).filter(|d| *d > 0.0)?;
        Some(ParsedEntry {
            time,
            dose,
            method: self.method,
            curve_visible: self.curve_visible,
            uncertainty_visible: self.uncertainty_visible,
        })
    }

    /// Raw parse that keeps incomplete cells as `None`.
    pub fn read_incomplete(&self) -> EntryDraft {
        EntryDraft {
            time: TimeValue::parse(&self.time),
            dose: parse_finite(&self.dose),
            method: Some(self.method),
            curve_visible: self.curve_visible,
            uncertainty_visible: self.uncertainty_visible,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.time.trim().is_empty() && self.dose.trim().is_empty()
    }

    fn revalidate(&mut self) -> bool {
        self.valid = self.read().is_some();
        self.valid
    }
}

/// A single field change on an entry
#[derive(Clone, Debug, PartialEq)]
pub enum FieldEdit {
    Time(String),
    Dose(String),
    Method(DeliveryMethod),
    CurveVisible(bool),
    UncertaintyVisible(bool),
}

/// Ordered collection of dose entries for one regimen table
#[derive(Clone, Debug, PartialEq)]
pub struct RegimenTable {
    kind: TableKind,
    entries: Vec<DoseEntry>,
    next_id: u64,
}

impl RegimenTable {
    /// A table holding a single scratch entry
    pub fn new(kind: TableKind) -> Self {
        let mut table = Self::empty(kind);
        table.add_entry(None);
        table
    }

    /// A table with zero entries (callers must re-add a scratch entry)
    pub fn empty(kind: TableKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn entries(&self) -> &[DoseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&DoseEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Id of the trailing scratch entry, if the last entry is incomplete
    pub fn scratch_id(&self) -> Option<EntryId> {
        self.entries.last().filter(|e| !e.valid).map(|e| e.id)
    }

    /// Append an entry. Without a draft an empty scratch entry is created
    /// whose method continues the previous entry's method.
    pub fn add_entry(&mut self, draft: Option<EntryDraft>) -> EntryId {
        let draft = draft.unwrap_or_default();
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let method = draft
            .method
            .or_else(|| self.entries.last().map(|e| e.method))
            .unwrap_or_default();

        let carries_flags = match self.kind {
            TableKind::SteadyState => true,
            TableKind::Multidose => self.entries.is_empty(),
        };
        let (curve_visible, uncertainty_visible) = if carries_flags {
            (
                Some(draft.curve_visible.unwrap_or(true)),
                Some(draft.uncertainty_visible.unwrap_or(true)),
            )
        } else {
            (None, None)
        };

        let mut entry = DoseEntry {
            id,
            time: draft.time.map(|t| t.to_string()).unwrap_or_default(),
            dose: draft.dose.map(|d| d.to_string()).unwrap_or_default(),
            method,
            curve_visible,
            uncertainty_visible,
            valid: false,
        };
        entry.revalidate();

        tracing::debug!(
            "Added entry {} to {:?} table (valid: {})",
            id,
            self.kind,
            entry.valid
        );
        self.entries.push(entry);
        id
    }

    /// Add an entry while keeping the scratch entry last.
    ///
    /// A blank scratch entry is filled in place. Half-typed scratch input
    /// stays at the end and the new entry goes in front of it.
    pub fn insert_entry(&mut self, draft: EntryDraft) -> EntryId {
        match self.entries.last() {
            Some(last) if !last.valid && last.is_blank() => self.fill_scratch(draft),
            Some(last) if !last.valid => {
                let (curve, uncertainty) = (draft.curve_visible, draft.uncertainty_visible);
                let id = self.add_entry(Some(draft));
                let n = self.entries.len();
                self.entries.swap(n - 2, n - 1);

                // the new first multidose entry takes over the table flags
                if self.kind == TableKind::Multidose && n == 2 {
                    let scratch = &mut self.entries[1];
                    let flags = (scratch.curve_visible.take(), scratch.uncertainty_visible.take());
                    let first = &mut self.entries[0];
                    first.curve_visible = curve.or(flags.0);
                    first.uncertainty_visible = uncertainty.or(flags.1);
                }
                id
            }
            _ => {
                let id = self.add_entry(Some(draft));
                self.reconcile_scratch();
                id
            }
        }
    }

    /// Remove an entry, keeping at least one entry and a trailing scratch.
    ///
    /// Returns false if no entry has this id.
    pub fn remove_entry(&mut self, id: EntryId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let removed = self.entries.remove(index);

        if self.kind == TableKind::Multidose && index == 0 {
            if let Some(first) = self.entries.first_mut() {
                first.curve_visible = removed.curve_visible;
                first.uncertainty_visible = removed.uncertainty_visible;
            }
        }

        if self.entries.is_empty() {
            self.add_entry(None);
        }
        self.reconcile_scratch();
        true
    }

    /// Empty the table to zero entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Empty the table and re-add a single scratch entry
    pub fn reset(&mut self) {
        self.clear();
        self.add_entry(None);
    }

    /// Apply a field edit.
    ///
    /// Returns `None` for an unknown id, otherwise whether downstream
    /// recomputation is needed: on a validity transition, or whenever the
    /// edited entry is valid afterwards.
    pub fn edit(&mut self, id: EntryId, edit: FieldEdit) -> Option<bool> {
        let index = self.position(id)?;

        // table-level flags live on the first multidose entry
        let target = match (&edit, self.kind) {
            (FieldEdit::CurveVisible(_) | FieldEdit::UncertaintyVisible(_), TableKind::Multidose) => 0,
            _ => index,
        };

        let entry = &mut self.entries[target];
        let was_valid = entry.valid;
        match edit {
            FieldEdit::Time(text) => entry.time = text,
            FieldEdit::Dose(text) => entry.dose = text,
            FieldEdit::Method(method) => entry.method = method,
            FieldEdit::CurveVisible(visible) => entry.curve_visible = Some(visible),
            FieldEdit::UncertaintyVisible(visible) => entry.uncertainty_visible = Some(visible),
        }
        let is_valid = entry.revalidate();

        self.reconcile_scratch();
        Some(was_valid != is_valid || is_valid)
    }

    /// Overwrite the trailing scratch entry with `draft`, then grow a new
    /// scratch entry behind it if it became valid.
    pub fn fill_scratch(&mut self, draft: EntryDraft) -> EntryId {
        let Some(id) = self.scratch_id() else {
            let id = self.add_entry(Some(draft));
            self.reconcile_scratch();
            return id;
        };

        let Some(entry) = self.entries.last_mut() else {
            return id;
        };
        entry.time = draft.time.map(|t| t.to_string()).unwrap_or_default();
        entry.dose = draft.dose.map(|d| d.to_string()).unwrap_or_default();
        if let Some(method) = draft.method {
            entry.method = method;
        }
        if entry.curve_visible.is_some() {
            entry.curve_visible = draft.curve_visible.or(entry.curve_visible);
        }
        if entry.uncertainty_visible.is_some() {
            entry.uncertainty_visible = draft.uncertainty_visible.or(entry.uncertainty_visible);
        }
        entry.revalidate();

        self.reconcile_scratch();
        id
    }

    /// Restore the scratch-entry invariant: grow a scratch entry behind a
    /// valid last entry, and drop a blank last entry that follows another
    /// invalid entry.
    pub fn reconcile_scratch(&mut self) {
        let n = self.entries.len();
        let last = self.entries.last().map(|e| (e.valid, e.is_blank()));
        let before_valid = n > 1 && self.entries[n - 2].valid;

        match last {
            None | Some((true, _)) => {
                self.add_entry(None);
            }
            Some((false, true)) if n > 1 && !before_valid => {
                if let Some(dropped) = self.entries.pop() {
                    tracing::debug!("Dropped surplus scratch entry {}", dropped.id);
                }
            }
            Some(_) => {}
        }
    }

    /// Parsed view of every valid entry, in stored order
    pub fn valid_entries(&self) -> Vec<ParsedEntry> {
        self.entries.iter().filter_map(DoseEntry::read).collect()
    }

    /// Table-level (curve, uncertainty) visibility of a multidose table
    pub fn table_flags(&self) -> (bool, bool) {
        self.entries
            .first()
            .map(|e| {
                (
                    e.curve_visible.unwrap_or(true),
                    e.uncertainty_visible.unwrap_or(true),
                )
            })
            .unwrap_or((true, true))
    }
}
