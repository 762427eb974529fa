use crate::records::{LatLng, Record, RecordId};
use ahash::AHashMap;
use ordered_float::OrderedFloat;
use rgb::RGB8;
use serde::Serialize;
use std::collections::hash_map::Entry;

type CoordinateKey = (OrderedFloat<f64>, OrderedFloat<f64>);

/// One record offered for placement.
#[derive(Clone, Copy, Debug)]
pub struct PlacementInput<'a> {
    pub record: &'a Record,
    /// Position of the record in the list its number is taken from.
    pub ordinal: usize,
    /// Records are only merged with records of the same group when set.
    pub group_id: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    pub coordinate: LatLng,
    /// Where the pin is drawn, after stacking.
    pub position: LatLng,
    pub record_ids: Vec<RecordId>,
    pub stacking_index: u32,
    /// 1-based number shown on the pin.
    pub display_index: usize,
    pub group_id: Option<String>,
    pub color: Option<RGB8>,
}

impl MarkerDescriptor {
    pub fn count(&self) -> usize {
        self.record_ids.len()
    }

    pub fn is_multi(&self) -> bool {
        self.record_ids.len() > 1
    }

    pub fn first_record_id(&self) -> RecordId {
        self.record_ids[0]
    }
}

#[derive(Clone, Debug)]
pub struct CoordinateDeduplicator {
    offset_unit: f64,
    scale: f64,
}

impl CoordinateDeduplicator {
    pub fn new(offset_unit: f64, coordinate_precision: u32) -> Self {
        Self {
            offset_unit,
            scale: 10f64.powi(coordinate_precision.min(15) as i32),
        }
    }

    pub fn round(&self, position: LatLng) -> LatLng {
        LatLng {
            lat: (position.lat * self.scale).round() / self.scale,
            lng: (position.lng * self.scale).round() / self.scale,
        }
    }

    /// Merges records sharing a rounded coordinate (and group, when given) into one marker.
    ///
    /// Markers created at an already used coordinate get the next stacking index,
    /// whatever their group, and are shifted by `stacking_index * offset_unit`.
    /// Unlocated records are skipped.
    pub fn place<'a, I>(&self, inputs: I) -> Vec<MarkerDescriptor>
    where
        I: IntoIterator<Item = PlacementInput<'a>>,
    {
        let mut markers: Vec<MarkerDescriptor> = Vec::new();
        let mut marker_by_key: AHashMap<(CoordinateKey, Option<&'a str>), usize> = AHashMap::new();
        let mut stacked_at: AHashMap<CoordinateKey, u32> = AHashMap::new();

        for input in inputs {
            let Some(position) = input.record.position() else {
                continue;
            };

            let coordinate = self.round(position);
            let coordinate_key = (OrderedFloat(coordinate.lat), OrderedFloat(coordinate.lng));

            match marker_by_key.entry((coordinate_key, input.group_id)) {
                Entry::Occupied(existing) => {
                    markers[*existing.get()].record_ids.push(input.record.id);
                }
                Entry::Vacant(slot) => {
                    let stacking_index = match stacked_at.entry(coordinate_key) {
                        Entry::Occupied(mut count) => {
                            *count.get_mut() += 1;
                            *count.get()
                        }
                        Entry::Vacant(count) => *count.insert(0),
                    };

                    let offset = f64::from(stacking_index) * self.offset_unit;

                    slot.insert(markers.len());
                    markers.push(MarkerDescriptor {
                        coordinate,
                        position: position.stacked(offset),
                        record_ids: vec![input.record.id],
                        stacking_index,
                        display_index: input.ordinal + 1,
                        group_id: input.group_id.map(str::to_string),
                        color: None,
                    });
                }
            }
        }

        markers
    }
}
