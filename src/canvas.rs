//! Drawing surface the renderer talks to, and a GeoJSON implementation of it.

use crate::config::colour_to_hex;
use crate::records::{LatLng, RecordId};
use crate::route_polyline::PolylineStyle;
use geo_types::{LineString, Point, Rect, coord};
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use indexmap::IndexMap;
use rgb::RGB8;
use serde::Serialize;
use serde_json::Map;

pub type LayerId = u64;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerIcon {
    pub count: usize,
    /// Shown on the pin only when numbering is on.
    pub number: Option<usize>,
    pub color: Option<RGB8>,
}

impl MarkerIcon {
    pub fn is_multi(&self) -> bool {
        self.count > 1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PopupField {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Popup {
    pub position: LatLng,
    pub fields: Vec<PopupField>,
    /// Records opened by the popup's open button.
    pub record_ids: Vec<RecordId>,
    pub has_form_view: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Viewport {
    #[default]
    World,
    Bounds(Rect<f64>),
}

pub trait MapCanvas {
    fn add_marker(
        &mut self,
        position: LatLng,
        icon: &MarkerIcon,
        record_ids: &[RecordId],
    ) -> LayerId;

    fn add_polyline(&mut self, points: &[LatLng], style: PolylineStyle) -> LayerId;

    fn set_polyline_style(&mut self, layer: LayerId, style: PolylineStyle);

    fn remove_layer(&mut self, layer: LayerId);

    fn fit_bounds(&mut self, bounds: Rect<f64>);

    fn fit_world(&mut self);

    fn open_popup(&mut self, popup: Popup);

    fn close_popup(&mut self);
}

/// Keeps every layer as a GeoJSON feature, in insertion order.
#[derive(Debug, Default)]
pub struct GeoJsonCanvas {
    next_id: LayerId,
    layers: IndexMap<LayerId, Feature>,
    viewport: Viewport,
    popup: Option<Popup>,
}

impl GeoJsonCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer: LayerId) -> Option<&Feature> {
        self.layers.get(&layer)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    pub fn feature_collection(&self) -> FeatureCollection {
        let bbox = match self.viewport {
            Viewport::World => None,
            Viewport::Bounds(rect) => Some(vec![
                rect.min().x,
                rect.min().y,
                rect.max().x,
                rect.max().y,
            ]),
        };

        FeatureCollection {
            bbox,
            features: self.layers.values().cloned().collect(),
            foreign_members: None,
        }
    }

    pub fn to_geojson_string(&self) -> String {
        GeoJson::from(self.feature_collection()).to_string()
    }

    fn insert(&mut self, value: geojson::Value, properties: Map<String, JsonValue>) -> LayerId {
        self.next_id += 1;
        let id = self.next_id;

        self.layers.insert(
            id,
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(value)),
                id: Some(geojson::feature::Id::Number(id.into())),
                properties: Some(properties),
                foreign_members: None,
            },
        );

        id
    }
}

fn style_properties(properties: &mut Map<String, JsonValue>, style: PolylineStyle) {
    properties.insert("color".to_string(), JsonValue::from(colour_to_hex(style.color)));
    properties.insert("weight".to_string(), JsonValue::from(style.weight));
    properties.insert("opacity".to_string(), JsonValue::from(style.opacity));
}

impl MapCanvas for GeoJsonCanvas {
    fn add_marker(
        &mut self,
        position: LatLng,
        icon: &MarkerIcon,
        record_ids: &[RecordId],
    ) -> LayerId {
        let point = Point::new(position.lng, position.lat);

        let mut properties = Map::new();
        properties.insert("kind".to_string(), JsonValue::from("marker"));
        properties.insert("count".to_string(), JsonValue::from(icon.count));
        properties.insert("is_multi".to_string(), JsonValue::from(icon.is_multi()));
        if let Some(number) = icon.number {
            properties.insert("number".to_string(), JsonValue::from(number));
        }
        if let Some(color) = icon.color {
            properties.insert("color".to_string(), JsonValue::from(colour_to_hex(color)));
        }
        properties.insert("record_ids".to_string(), JsonValue::from(record_ids.to_vec()));

        self.insert(geojson::Value::from(&point), properties)
    }

    fn add_polyline(&mut self, points: &[LatLng], style: PolylineStyle) -> LayerId {
        let line = LineString::new(points.iter().map(|p| coord! { x: p.lng, y: p.lat }).collect());

        let mut properties = Map::new();
        properties.insert("kind".to_string(), JsonValue::from("route"));
        style_properties(&mut properties, style);

        self.insert(geojson::Value::from(&line), properties)
    }

    fn set_polyline_style(&mut self, layer: LayerId, style: PolylineStyle) {
        if let Some(properties) = self
            .layers
            .get_mut(&layer)
            .and_then(|feature| feature.properties.as_mut())
        {
            style_properties(properties, style);
        }
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.layers.shift_remove(&layer);
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.viewport = Viewport::Bounds(bounds);
    }

    fn fit_world(&mut self) {
        self.viewport = Viewport::World;
    }

    fn open_popup(&mut self, popup: Popup) {
        self.popup = Some(popup);
    }

    fn close_popup(&mut self) {
        self.popup = None;
    }
}
