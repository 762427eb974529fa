//! Keeps a [`MapCanvas`] in step with the latest [`MapState`].

use crate::canvas::{LayerId, MapCanvas, MarkerIcon, Popup, PopupField};
use crate::data_load::MapQuery;
use crate::map_state::MapState;
use crate::placement::{MarkerDescriptor, MarkerPlacementPipeline, located_bounds};
use crate::records::{FieldDescriptor, FieldType, Record, RecordId, display_value, value_to_key};
use crate::route_polyline::route_styles;
use ahash::AHashSet;
use log::debug;

#[derive(Clone, Debug, Default)]
pub struct RendererOptions {
    /// Numbers are drawn on the pins.
    pub numbering: bool,
    pub hide_name: bool,
    pub has_form_view: bool,
    pub popup_fields: Vec<FieldDescriptor>,
}

impl RendererOptions {
    pub fn from_query(query: &MapQuery) -> Self {
        Self {
            numbering: query.routing,
            hide_name: query.hide_name,
            has_form_view: query.has_form_view,
            popup_fields: query
                .popup_field_names
                .iter()
                .map(|name| query.descriptor(name))
                .collect(),
        }
    }
}

pub struct MapRenderer {
    pipeline: MarkerPlacementPipeline,
    options: RendererOptions,
    collapsed_group_ids: AHashSet<String>,
    group_by_key: Option<String>,
    markers: Vec<(LayerId, MarkerDescriptor)>,
    routes: Vec<LayerId>,
    selected_route: Option<usize>,
}

impl MapRenderer {
    pub fn new(pipeline: MarkerPlacementPipeline, options: RendererOptions) -> Self {
        Self {
            pipeline,
            options,
            collapsed_group_ids: AHashSet::new(),
            group_by_key: None,
            markers: Vec::new(),
            routes: Vec::new(),
            selected_route: None,
        }
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerDescriptor> {
        self.markers.iter().map(|(_, marker)| marker)
    }

    pub fn route_layers(&self) -> &[LayerId] {
        &self.routes
    }

    pub fn selected_route(&self) -> Option<usize> {
        self.selected_route
    }

    pub fn is_collapsed(&self, group_id: &str) -> bool {
        self.collapsed_group_ids.contains(group_id)
    }

    pub fn collapse_group(&mut self, group_id: &str) {
        self.collapsed_group_ids.insert(group_id.to_string());
    }

    /// Opens a collapsed group or collapses an open one.
    pub fn toggle_group(&mut self, group_id: &str) {
        if !self.collapsed_group_ids.remove(group_id) {
            self.collapsed_group_ids.insert(group_id.to_string());
        }
    }

    /// Collapsed groups only survive while the grouping key stays the same.
    pub fn sync_grouping(&mut self, state: &MapState) {
        if self.group_by_key.as_deref() != state.group_by_key() {
            if !self.collapsed_group_ids.is_empty() {
                debug!("grouping changed, reopening {} groups", self.collapsed_group_ids.len());
            }
            self.collapsed_group_ids.clear();
            self.group_by_key = state.group_by_key().map(str::to_string);
        }
    }

    pub fn update(&mut self, state: &MapState, canvas: &mut dyn MapCanvas) {
        self.sync_grouping(state);

        if state.should_update_position {
            match located_bounds(&state.records) {
                Some(bounds) => canvas.fit_bounds(bounds),
                None => canvas.fit_world(),
            }
            canvas.close_popup();
        }

        self.add_markers(state, canvas);
        self.add_routes(state, canvas);
    }

    fn add_markers(&mut self, state: &MapState, canvas: &mut dyn MapCanvas) {
        self.remove_markers(canvas);

        for marker in self.pipeline.build(state, &self.collapsed_group_ids) {
            let icon = MarkerIcon {
                count: marker.count(),
                number: self.options.numbering.then_some(marker.display_index),
                color: marker.color,
            };

            let layer = canvas.add_marker(marker.position, &icon, &marker.record_ids);
            self.markers.push((layer, marker));
        }
    }

    fn add_routes(&mut self, state: &MapState, canvas: &mut dyn MapCanvas) {
        self.remove_routes(canvas);

        // routes are only drawn over the paid tiles
        if !state.use_paid_tiles {
            return;
        }

        let legs = state.routes.legs();
        for (leg, style) in legs.iter().zip(route_styles(legs.len(), None)) {
            self.routes.push(canvas.add_polyline(&leg.points, style));
        }
    }

    /// Highlights one leg and dims the others. Returns false for an unknown leg.
    pub fn select_route(&mut self, leg: usize, canvas: &mut dyn MapCanvas) -> bool {
        if leg >= self.routes.len() {
            return false;
        }

        for (layer, style) in self
            .routes
            .iter()
            .zip(route_styles(self.routes.len(), Some(leg)))
        {
            canvas.set_polyline_style(*layer, style);
        }
        self.selected_route = Some(leg);

        true
    }

    pub fn open_marker_popup(
        &self,
        state: &MapState,
        layer: LayerId,
        canvas: &mut dyn MapCanvas,
    ) -> bool {
        let Some((_, marker)) = self.markers.iter().find(|(id, _)| *id == layer) else {
            return false;
        };
        let Some(record) = state.record(marker.first_record_id()) else {
            return false;
        };

        canvas.open_popup(Popup {
            position: marker.position,
            fields: self.popup_fields(record),
            record_ids: marker.record_ids.clone(),
            has_form_view: self.options.has_form_view,
        });

        true
    }

    /// Popup of a single record at its own position, as picked from the record list.
    pub fn open_record_popup(
        &self,
        state: &MapState,
        id: RecordId,
        canvas: &mut dyn MapCanvas,
    ) -> bool {
        let Some(record) = state.record(id) else {
            return false;
        };
        let Some(position) = record.position() else {
            return false;
        };

        canvas.open_popup(Popup {
            position,
            fields: self.popup_fields(record),
            record_ids: vec![id],
            has_form_view: self.options.has_form_view,
        });

        true
    }

    fn popup_fields(&self, record: &Record) -> Vec<PopupField> {
        let mut fields = Vec::new();

        if !self.options.hide_name {
            fields.push(PopupField {
                label: "Name".to_string(),
                value: record.display_name().unwrap_or_default().to_string(),
            });
        }

        for field in &self.options.popup_fields {
            let value = record.field(&field.name);

            let text = match field.field_type {
                FieldType::Selection => {
                    let key = value_to_key(value);
                    field
                        .selection
                        .iter()
                        .find(|(option, _)| value_to_key(option) == key)
                        .map(|(_, label)| label.clone())
                        .unwrap_or_else(|| display_value(value))
                }
                _ => display_value(value),
            };

            if !text.is_empty() {
                fields.push(PopupField {
                    label: field.label().to_string(),
                    value: text,
                });
            }
        }

        fields
    }

    fn remove_markers(&mut self, canvas: &mut dyn MapCanvas) {
        for (layer, _) in self.markers.drain(..) {
            canvas.remove_layer(layer);
        }
    }

    fn remove_routes(&mut self, canvas: &mut dyn MapCanvas) {
        for layer in self.routes.drain(..) {
            canvas.remove_layer(layer);
        }
        self.selected_route = None;
    }

    /// Removes every layer this renderer added.
    pub fn teardown(&mut self, canvas: &mut dyn MapCanvas) {
        self.remove_markers(canvas);
        self.remove_routes(canvas);
        canvas.close_popup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{GeoJsonCanvas, Viewport};
    use crate::config::GroupLabels;
    use crate::grouping::{FieldGroupingEngine, GroupBySpec};
    use crate::placement::PlacementConfig;
    use crate::records::LatLng;
    use crate::route_polyline::{PolylineStyle, RouteLeg, RouteState};
    use approx::assert_relative_eq;
    use serde_json::json;

    fn renderer(options: RendererOptions) -> MapRenderer {
        MapRenderer::new(MarkerPlacementPipeline::new(PlacementConfig::default()), options)
    }

    fn records() -> Vec<Record> {
        vec![
            Record::new(1)
                .at(50.0, 4.0)
                .with_field("display_name", json!("Brussels office"))
                .with_field("active", json!(true))
                .with_field("stage", json!("won")),
            Record::new(2)
                .at(51.0, 5.0)
                .with_field("display_name", json!("Antwerp depot"))
                .with_field("active", json!(false)),
            Record::new(3)
                .at(50.0, 4.0)
                .with_field("display_name", json!("Brussels annex"))
                .with_field("active", json!(true)),
        ]
    }

    fn grouped_by(field: FieldDescriptor) -> MapState {
        let records = records();
        let groups = FieldGroupingEngine::new(GroupLabels::default()).group(&records, &field, None);
        MapState {
            count: records.len(),
            group_by: Some(GroupBySpec::parse(&field.name)),
            groups: Some(groups),
            records,
            should_update_position: true,
            ..Default::default()
        }
    }

    fn routed_state(use_paid_tiles: bool) -> MapState {
        MapState {
            records: records(),
            routes: RouteState::Ready(vec![
                RouteLeg {
                    points: vec![LatLng::new(50.0, 4.0), LatLng::new(50.5, 4.5)],
                },
                RouteLeg {
                    points: vec![LatLng::new(50.5, 4.5), LatLng::new(51.0, 5.0)],
                },
            ]),
            use_paid_tiles,
            should_update_position: true,
            ..Default::default()
        }
    }

    #[test]
    fn update_fits_located_records() {
        let mut canvas = GeoJsonCanvas::new();
        let mut renderer = renderer(RendererOptions::default());

        renderer.update(&routed_state(false), &mut canvas);

        let Viewport::Bounds(bounds) = canvas.viewport() else {
            panic!("expected bounds");
        };
        assert_relative_eq!(bounds.min().y, 50.0);
        assert_relative_eq!(bounds.max().x, 5.0);
        assert_eq!(renderer.markers().count(), 2);
        assert!(renderer.markers().all(|m| m.color.is_none()));
    }

    #[test]
    fn nothing_located_shows_the_world() {
        let mut canvas = GeoJsonCanvas::new();
        canvas.fit_bounds(geo_types::Rect::new(
            geo_types::coord! { x: 0.0, y: 0.0 },
            geo_types::coord! { x: 1.0, y: 1.0 },
        ));

        let state = MapState {
            records: vec![Record::new(1)],
            should_update_position: true,
            ..Default::default()
        };
        renderer(RendererOptions::default()).update(&state, &mut canvas);

        assert_eq!(canvas.viewport(), Viewport::World);
        assert_eq!(canvas.layer_count(), 0);
    }

    #[test]
    fn routes_need_paid_tiles() {
        let mut canvas = GeoJsonCanvas::new();
        let mut renderer = renderer(RendererOptions::default());

        renderer.update(&routed_state(false), &mut canvas);
        assert!(renderer.route_layers().is_empty());

        renderer.update(&routed_state(true), &mut canvas);
        assert_eq!(renderer.route_layers().len(), 2);
        // markers from the first update were replaced, not duplicated
        assert_eq!(canvas.layer_count(), 4);
    }

    #[test]
    fn selecting_a_leg_restyles_all_legs() {
        let mut canvas = GeoJsonCanvas::new();
        let mut renderer = renderer(RendererOptions::default());
        renderer.update(&routed_state(true), &mut canvas);

        assert!(renderer.select_route(1, &mut canvas));
        assert!(!renderer.select_route(5, &mut canvas));
        assert_eq!(renderer.selected_route(), Some(1));

        fn opacity(canvas: &GeoJsonCanvas, layer: LayerId) -> f64 {
            canvas.layer(layer).unwrap().properties.as_ref().unwrap()["opacity"]
                .as_f64()
                .unwrap()
        }
        let layers = renderer.route_layers().to_vec();
        assert_relative_eq!(opacity(&canvas, layers[0]), PolylineStyle::DEFAULT.opacity);
        assert_relative_eq!(opacity(&canvas, layers[1]), PolylineStyle::SELECTED.opacity);

        assert!(renderer.select_route(0, &mut canvas));
        assert_relative_eq!(opacity(&canvas, layers[0]), 1.0);
        assert_relative_eq!(opacity(&canvas, layers[1]), 0.3);
    }

    #[test]
    fn collapsed_groups_reset_when_grouping_changes() {
        let mut canvas = GeoJsonCanvas::new();
        let mut renderer = renderer(RendererOptions::default());

        let by_active = grouped_by(FieldDescriptor::new("active", FieldType::Boolean));
        renderer.update(&by_active, &mut canvas);
        assert_eq!(renderer.markers().count(), 2);

        renderer.toggle_group("Yes");
        renderer.update(&by_active, &mut canvas);
        assert!(renderer.is_collapsed("Yes"));
        assert_eq!(
            renderer.markers().map(|m| m.record_ids.clone()).collect::<Vec<_>>(),
            vec![vec![2]]
        );

        renderer.toggle_group("Yes");
        assert!(!renderer.is_collapsed("Yes"));
        renderer.collapse_group("Yes");

        let by_stage = grouped_by(FieldDescriptor::new("stage", FieldType::Scalar));
        renderer.update(&by_stage, &mut canvas);
        assert!(!renderer.is_collapsed("Yes"));
        assert_eq!(renderer.markers().count(), 3);
    }

    #[test]
    fn marker_popup_lists_name_and_fields() {
        let mut canvas = GeoJsonCanvas::new();
        let stage = FieldDescriptor {
            string: Some("Stage".to_string()),
            ..FieldDescriptor::new("stage", FieldType::Selection)
        }
        .with_selection(vec![(json!("won"), "Won".to_string())]);
        let mut renderer = renderer(RendererOptions {
            has_form_view: true,
            popup_fields: vec![stage],
            ..Default::default()
        });

        let state = routed_state(false);
        renderer.update(&state, &mut canvas);

        let layer = canvas.feature_collection().features[0]
            .id
            .clone()
            .and_then(|id| match id {
                geojson::feature::Id::Number(n) => n.as_u64(),
                _ => None,
            })
            .unwrap();

        assert!(renderer.open_marker_popup(&state, layer, &mut canvas));
        let popup = canvas.popup().unwrap();
        assert_eq!(popup.record_ids, vec![1, 3]);
        assert!(popup.has_form_view);
        assert_eq!(
            popup.fields,
            vec![
                PopupField {
                    label: "Name".to_string(),
                    value: "Brussels office".to_string()
                },
                PopupField {
                    label: "Stage".to_string(),
                    value: "Won".to_string()
                },
            ]
        );

        assert!(!renderer.open_marker_popup(&state, 999, &mut canvas));
    }

    #[test]
    fn record_popup_respects_hide_name() {
        let mut canvas = GeoJsonCanvas::new();
        let renderer = renderer(RendererOptions {
            hide_name: true,
            ..Default::default()
        });
        let state = routed_state(false);

        assert!(renderer.open_record_popup(&state, 2, &mut canvas));
        let popup = canvas.popup().unwrap();
        assert!(popup.fields.is_empty());
        assert_eq!(popup.position, LatLng::new(51.0, 5.0));
        assert!(!renderer.open_record_popup(&state, 42, &mut canvas));
    }

    #[test]
    fn numbers_only_with_numbering() {
        let mut canvas = GeoJsonCanvas::new();
        let mut numbered = renderer(RendererOptions {
            numbering: true,
            ..Default::default()
        });
        numbered.update(&routed_state(false), &mut canvas);

        let numbers: Vec<_> = canvas
            .feature_collection()
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap().get("number").cloned())
            .collect();
        assert_eq!(numbers, vec![Some(json!(1)), Some(json!(2))]);

        numbered.teardown(&mut canvas);
        assert_eq!(canvas.layer_count(), 0);

        renderer(RendererOptions::default()).update(&routed_state(false), &mut canvas);
        assert!(
            canvas
                .feature_collection()
                .features
                .iter()
                .all(|f| f.properties.as_ref().unwrap().get("number").is_none())
        );
    }

    #[test]
    fn options_follow_the_query() {
        let query = MapQuery {
            routing: true,
            hide_name: true,
            popup_field_names: vec!["phone".to_string()],
            ..Default::default()
        };
        let options = RendererOptions::from_query(&query);

        assert!(options.numbering);
        assert!(options.hide_name);
        assert_eq!(options.popup_fields[0].name, "phone");
    }
}
