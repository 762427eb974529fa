//! Turns a directions response into one polyline per leg.

use crate::records::LatLng;
use geo_types::{LineString, coord};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub legs: Vec<RawRouteLeg>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawRouteLeg {
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RouteStep {
    pub geometry: StepGeometry,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StepGeometry {
    /// `[longitude, latitude]` pairs.
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteLeg {
    pub points: Vec<LatLng>,
}

impl RouteLeg {
    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::new(
            self.points
                .iter()
                .map(|p| coord! { x: p.lng, y: p.lat })
                .collect(),
        )
    }

    /// Encoded polyline, precision 5.
    pub fn encoded(&self) -> Result<String, String> {
        polyline::encode_coordinates(self.to_line_string(), 5).map_err(|e| e.to_string())
    }
}

/// Outcome of the routing step of a load.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RouteState {
    #[default]
    NotRequested,
    Ready(Vec<RouteLeg>),
    Failed(String),
}

impl RouteState {
    pub fn legs(&self) -> &[RouteLeg] {
        match self {
            RouteState::Ready(legs) => legs,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RouteState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Legs of the first candidate route, coordinates swapped to latitude first.
pub fn build_route_legs(routes: &[Route], routing_enabled: bool) -> Vec<RouteLeg> {
    if !routing_enabled {
        return Vec::new();
    }

    let Some(route) = routes.first() else {
        return Vec::new();
    };

    route
        .legs
        .iter()
        .map(|leg| RouteLeg {
            points: leg
                .steps
                .iter()
                .flat_map(|step| step.geometry.coordinates.iter())
                .map(|[lng, lat]| LatLng::new(*lat, *lng))
                .collect(),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolylineStyle {
    pub color: RGB8,
    pub weight: f64,
    pub opacity: f64,
}

impl PolylineStyle {
    pub const DEFAULT: PolylineStyle = PolylineStyle {
        color: RGB8 { r: 0, g: 0, b: 255 },
        weight: 5.0,
        opacity: 0.3,
    };

    pub const SELECTED: PolylineStyle = PolylineStyle {
        color: RGB8 { r: 0, g: 0, b: 139 },
        weight: 5.0,
        opacity: 1.0,
    };
}

/// Styles of `leg_count` legs with at most one highlighted.
pub fn route_styles(leg_count: usize, selected: Option<usize>) -> Vec<PolylineStyle> {
    (0..leg_count)
        .map(|leg| {
            if Some(leg) == selected {
                PolylineStyle::SELECTED
            } else {
                PolylineStyle::DEFAULT
            }
        })
        .collect()
}
