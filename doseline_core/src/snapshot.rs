//! Column snapshots of regimen tables and the restore path.
//!
//! A table snapshot is five index-aligned columns (times, doses, methods,
//! curve flags, uncertainty flags) covering every entry, incomplete ones
//! included. On disk and in share links it is a JSON array of those five
//! arrays; cells that do not parse are `null`.

use crate::presets;
use crate::share;
use crate::state::{Options, RegimenState};
use crate::store::{restore_local, SnapshotStore};
use crate::table::RegimenTable;
use crate::timeline::guess_time_mode;
use crate::types::{DeliveryMethod, EntryDraft, TableKind, TimeValue};
use crate::Result;
use serde::{Deserialize, Serialize};

type Columns = (
    Vec<Option<TimeValue>>,
    Vec<Option<f64>>,
    Vec<DeliveryMethod>,
    Vec<Option<bool>>,
    Vec<Option<bool>>,
);

/// Column-wise snapshot of one table
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Columns", into = "Columns")]
pub struct TableSnapshot {
    pub times: Vec<Option<TimeValue>>,
    pub doses: Vec<Option<f64>>,
    pub methods: Vec<DeliveryMethod>,
    pub curve_visible: Vec<Option<bool>>,
    pub uncertainty_visible: Vec<Option<bool>>,
}

impl From<Columns> for TableSnapshot {
    fn from((times, doses, methods, curve_visible, uncertainty_visible): Columns) -> Self {
        Self {
            times,
            doses,
            methods,
            curve_visible,
            uncertainty_visible,
        }
    }
}

impl From<TableSnapshot> for Columns {
    fn from(s: TableSnapshot) -> Self {
        (
            s.times,
            s.doses,
            s.methods,
            s.curve_visible,
            s.uncertainty_visible,
        )
    }
}

impl TableSnapshot {
    /// Snapshot every entry of `table`, keeping draft input
    pub fn of(table: &RegimenTable) -> Self {
        let mut snapshot = Self::default();
        for entry in table.entries() {
            let raw = entry.read_incomplete();
            snapshot.times.push(raw.time);
            snapshot.doses.push(raw.dose);
            snapshot.methods.push(entry.method);
            snapshot.curve_visible.push(raw.curve_visible);
            snapshot.uncertainty_visible.push(raw.uncertainty_visible);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// All five columns have the same length
    pub fn is_aligned(&self) -> bool {
        let n = self.times.len();
        self.doses.len() == n
            && self.methods.len() == n
            && self.curve_visible.len() == n
            && self.uncertainty_visible.len() == n
    }

    /// Row `i` as an entry draft
    pub fn draft(&self, i: usize) -> Option<EntryDraft> {
        Some(EntryDraft {
            time: self.times.get(i)?.clone(),
            dose: *self.doses.get(i)?,
            method: Some(*self.methods.get(i)?),
            curve_visible: *self.curve_visible.get(i)?,
            uncertainty_visible: *self.uncertainty_visible.get(i)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored value. Malformed JSON and misaligned columns are a
    /// miss, not an error.
    pub fn from_json(value: &str) -> Option<Self> {
        match serde_json::from_str::<TableSnapshot>(value) {
            Ok(snapshot) if snapshot.is_aligned() => Some(snapshot),
            Ok(_) => {
                tracing::warn!("Ignoring snapshot with misaligned columns");
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed snapshot: {}", e);
                None
            }
        }
    }
}

/// Snapshot of both tables; a table may be absent in a restore source
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegimenSnapshot {
    pub multidose: Option<TableSnapshot>,
    pub steady_state: Option<TableSnapshot>,
}

impl RegimenSnapshot {
    pub fn is_empty(&self) -> bool {
        self.multidose.is_none() && self.steady_state.is_none()
    }
}

/// Snapshot both tables of the state
pub fn snapshot(state: &RegimenState) -> RegimenSnapshot {
    RegimenSnapshot {
        multidose: Some(TableSnapshot::of(&state.multidose)),
        steady_state: Some(TableSnapshot::of(&state.steady_state)),
    }
}

/// Rebuild every table present in `snapshot` by replaying its rows.
///
/// Tables missing from the snapshot are left as they are. Returns whether
/// anything was restored.
pub fn restore(state: &mut RegimenState, snapshot: &RegimenSnapshot) -> bool {
    let mut restored = false;
    for (kind, table) in [
        (TableKind::Multidose, &snapshot.multidose),
        (TableKind::SteadyState, &snapshot.steady_state),
    ] {
        let Some(table) = table else {
            continue;
        };
        if !table.is_aligned() {
            tracing::warn!("Skipping misaligned {:?} snapshot", kind);
            continue;
        }

        let target = state.table_mut(kind);
        target.clear();
        for i in 0..table.len() {
            target.add_entry(table.draft(i));
        }
        target.reconcile_scratch();

        tracing::debug!("Restored {} {:?} entries", table.len(), kind);
        restored = true;
    }
    restored
}

/// Where the startup state came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreSource {
    SharedLink,
    LocalStore,
    DefaultPreset,
}

/// Build the startup state.
///
/// The default preset is applied first. A decodable share fragment then
/// wins outright (and the time mode is re-guessed from the restored
/// multidose times); only without one is the durable store consulted.
pub fn load_initial(
    fragment: Option<&str>,
    store: &dyn SnapshotStore,
    options: Options,
) -> (RegimenState, RestoreSource) {
    let mut state = RegimenState::new(options);
    presets::apply_preset(&mut state, presets::default_preset());

    if let Some(shared) = fragment.and_then(share::decode_token) {
        if restore(&mut state, &shared) {
            if shared.multidose.is_some() {
                let times: Vec<TimeValue> = state
                    .multidose
                    .valid_entries()
                    .into_iter()
                    .map(|e| e.time)
                    .collect();
                state.options.time_mode = guess_time_mode(&times);
            }
            tracing::info!("Loaded regimen from share link");
            return (state, RestoreSource::SharedLink);
        }
    } else if fragment.is_some() {
        tracing::warn!("Share link could not be decoded, ignoring it");
    }

    if let Some(stored) = restore_local(store) {
        if restore(&mut state, &stored) {
            tracing::info!("Loaded regimen from local store");
            return (state, RestoreSource::LocalStore);
        }
    }

    tracing::info!("Using default preset");
    (state, RestoreSource::DefaultPreset)
}
