use crate::grouping::{GroupBySpec, GroupMap};
use crate::records::{Record, RecordId};
use crate::route_polyline::RouteState;

/// Everything one load produced. Replaced as a whole, never patched in place.
#[derive(Clone, Debug, Default)]
pub struct MapState {
    pub records: Vec<Record>,
    /// Total matching records on the source side, which may exceed `records.len()`.
    pub count: usize,
    pub group_by: Option<GroupBySpec>,
    pub groups: Option<GroupMap>,
    pub routes: RouteState,
    pub fetching_coordinates: bool,
    pub should_update_position: bool,
    pub use_paid_tiles: bool,
    pub generation: u64,
}

impl MapState {
    pub fn is_grouped(&self) -> bool {
        self.groups.is_some()
    }

    pub fn group_by_key(&self) -> Option<&str> {
        self.group_by.as_ref().map(|spec| spec.raw.as_str())
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn located_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.position().is_some())
            .count()
    }

    pub fn unlocated_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.position().is_none())
            .map(|(index, _)| index)
            .collect()
    }
}
