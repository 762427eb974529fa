pub mod dedup;

use crate::config::{DEFAULT_PALETTE, parse_hex_colour};
use crate::map_state::MapState;
use crate::records::Record;
use ahash::AHashSet;
use geo::BoundingRect;
use geo_types::{MultiPoint, Point, Rect};
use rgb::RGB8;

pub use dedup::{CoordinateDeduplicator, MarkerDescriptor, PlacementInput};

/// Styling knobs of one map instance.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementConfig {
    pub offset_unit: f64,
    pub coordinate_precision: u32,
    pub palette: Vec<RGB8>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            offset_unit: 0.000025,
            coordinate_precision: 7,
            palette: DEFAULT_PALETTE
                .iter()
                .filter_map(|hex| parse_hex_colour(hex))
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MarkerPlacementPipeline {
    config: PlacementConfig,
    deduplicator: CoordinateDeduplicator,
}

impl MarkerPlacementPipeline {
    pub fn new(config: PlacementConfig) -> Self {
        let deduplicator =
            CoordinateDeduplicator::new(config.offset_unit, config.coordinate_precision);

        Self {
            config,
            deduplicator,
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Colour of the group at `position` in the full group order.
    pub fn group_color(&self, position: usize) -> Option<RGB8> {
        if self.config.palette.is_empty() {
            return None;
        }

        Some(self.config.palette[position % self.config.palette.len()])
    }

    pub fn build(
        &self,
        state: &MapState,
        collapsed_group_ids: &AHashSet<String>,
    ) -> Vec<MarkerDescriptor> {
        let Some(groups) = &state.groups else {
            let inputs = state
                .records
                .iter()
                .enumerate()
                .map(|(ordinal, record)| PlacementInput {
                    record,
                    ordinal,
                    group_id: None,
                });

            return self.deduplicator.place(inputs);
        };

        // numbering restarts inside every group
        let inputs = groups
            .values()
            .filter(|group| !collapsed_group_ids.contains(&group.id))
            .flat_map(|group| {
                group
                    .members
                    .iter()
                    .enumerate()
                    .filter_map(move |(ordinal, index)| {
                        state.records.get(*index).map(|record| PlacementInput {
                            record,
                            ordinal,
                            group_id: Some(group.id.as_str()),
                        })
                    })
            });

        let mut markers = self.deduplicator.place(inputs);

        for marker in &mut markers {
            marker.color = marker
                .group_id
                .as_deref()
                .and_then(|group_id| groups.get_index_of(group_id))
                .and_then(|position| self.group_color(position));
        }

        markers
    }
}

/// Bounding box of every located record, `None` when nothing is located.
pub fn located_bounds(records: &[Record]) -> Option<Rect<f64>> {
    let points: MultiPoint<f64> = records
        .iter()
        .filter_map(Record::position)
        .map(|position| Point::new(position.lng, position.lat))
        .collect::<Vec<_>>()
        .into();

    points.bounding_rect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupLabels;
    use crate::grouping::{FieldGroupingEngine, GroupBySpec};
    use crate::records::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn pipeline() -> MarkerPlacementPipeline {
        MarkerPlacementPipeline::new(PlacementConfig::default())
    }

    fn grouped_state(records: Vec<Record>, field: FieldDescriptor) -> MapState {
        let groups = FieldGroupingEngine::new(GroupLabels::default()).group(&records, &field, None);
        MapState {
            count: records.len(),
            group_by: Some(GroupBySpec::parse(&field.name)),
            groups: Some(groups),
            records,
            ..Default::default()
        }
    }

    #[test]
    fn ungrouped_numbers_follow_record_order() {
        let state = MapState {
            records: vec![
                Record::new(1).at(10.0, 20.0),
                Record::new(2).at(10.0, 20.0),
                Record::new(3).at(30.0, 40.0),
            ],
            ..Default::default()
        };

        let markers = pipeline().build(&state, &AHashSet::new());

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].record_ids, vec![1, 2]);
        assert_eq!(markers[0].display_index, 1);
        assert_eq!(markers[0].position, crate::records::LatLng::new(10.0, 20.0));
        assert_eq!(markers[1].record_ids, vec![3]);
        assert_eq!(markers[1].display_index, 3);
        assert!(markers.iter().all(|m| m.color.is_none() && m.group_id.is_none()));
    }

    #[test]
    fn collapsing_a_group_hides_its_markers() {
        let state = grouped_state(
            vec![
                Record::new(1).at(50.0, 4.0).with_field("active", json!(true)),
                Record::new(2).at(51.0, 5.0).with_field("active", json!(false)),
                Record::new(3).at(52.0, 6.0).with_field("active", json!(true)),
            ],
            FieldDescriptor::new("active", FieldType::Boolean),
        );

        let all = pipeline().build(&state, &AHashSet::new());
        assert_eq!(all.len(), 3);

        let mut collapsed = AHashSet::new();
        collapsed.insert("Yes".to_string());
        let visible = pipeline().build(&state, &collapsed);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].record_ids, vec![2]);
        assert_eq!(visible[0].group_id.as_deref(), Some("No"));
        assert_eq!(visible[0].display_index, 1);
        // "No" is the second group and keeps its colour while "Yes" is hidden
        assert_eq!(visible[0].color, pipeline().group_color(1));
        assert_eq!(
            all.iter().find(|m| m.record_ids == vec![2]).unwrap().color,
            visible[0].color
        );
    }

    #[test]
    fn grouped_numbering_restarts_per_group() {
        let state = grouped_state(
            vec![
                Record::new(1).at(50.0, 4.0).with_field("city", json!("Liège")),
                Record::new(2).at(50.5, 4.5).with_field("city", json!("Namur")),
                Record::new(3).at(51.0, 5.0).with_field("city", json!("Liège")),
            ],
            FieldDescriptor::new("city", FieldType::Scalar),
        );

        let markers = pipeline().build(&state, &AHashSet::new());
        let numbers: Vec<(i64, usize)> = markers
            .iter()
            .map(|m| (m.first_record_id(), m.display_index))
            .collect();

        assert_eq!(numbers, vec![(1, 1), (3, 2), (2, 1)]);
    }

    #[test]
    fn fanned_out_record_gets_a_marker_per_group() {
        let state = grouped_state(
            vec![Record::new(1).at(50.0, 4.0).with_field(
                "tag_ids",
                json!([{"id": 1, "display_name": "a"}, {"id": 2, "display_name": "b"}]),
            )],
            FieldDescriptor::new("tag_ids", FieldType::ManyToMany),
        );

        let markers = pipeline().build(&state, &AHashSet::new());

        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].stacking_index, 0);
        assert_eq!(markers[1].stacking_index, 1);
        assert_ne!(markers[0].color, markers[1].color);
    }

    #[test]
    fn build_is_idempotent() {
        let state = grouped_state(
            (1..=25)
                .map(|i| {
                    Record::new(i)
                        .at(50.0 + (i % 3) as f64, 4.0)
                        .with_field("city", json!(format!("c{}", i % 12)))
                })
                .collect(),
            FieldDescriptor::new("city", FieldType::Scalar),
        );

        let first = pipeline().build(&state, &AHashSet::new());
        let second = pipeline().build(&state, &AHashSet::new());
        assert_eq!(first, second);
        // twelve groups wrap around the ten colours
        assert_eq!(pipeline().group_color(11), pipeline().group_color(1));
    }

    #[test]
    fn bounds_cover_located_records() {
        let records = vec![
            Record::new(1).at(50.0, 4.0),
            Record::new(2),
            Record::new(3).at(51.5, 3.0),
        ];

        let bounds = located_bounds(&records).unwrap();
        assert_eq!(bounds.min().x, 3.0);
        assert_eq!(bounds.max().y, 51.5);
        assert!(located_bounds(&[Record::new(9)]).is_none());
    }
}
