use crate::errors::ConfigError;
use crate::placement::PlacementConfig;
use chrono_tz::Tz;
use rgb::RGB8;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const MAPBOX_TILES_URL: &str =
    "https://api.mapbox.com/styles/v1/{id}/tiles/{z}/{x}/{y}?access_token={accessToken}";
pub const OSM_TILES_URL: &str = "https://a.tile.openstreetmap.org/{z}/{x}/{y}.png";

pub const DEFAULT_PALETTE: [&str; 10] = [
    "#F06050", "#6CC1ED", "#F7CD1F", "#814968", "#30C381", "#D6145F", "#475577", "#F4A460",
    "#EB7E7F", "#2C8397",
];

/// Labels of the synthetic groups.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GroupLabels {
    pub yes: String,
    pub no: String,
    pub none: String,
}

impl Default for GroupLabels {
    fn default() -> Self {
        Self {
            yes: "Yes".to_string(),
            no: "No".to_string(),
            none: "None".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapViewConfig {
    /// Paid tile and directions token; without it the map falls back to OSM tiles.
    pub mapbox_token: Option<String>,
    pub source_timezone: Tz,
    pub display_timezone: Tz,
    pub refresh_interval_ms: u64,
    pub offset_unit: f64,
    pub coordinate_precision: u32,
    pub palette: Vec<String>,
    pub labels: GroupLabels,
    pub tile_url: Option<String>,
    pub copyright: Option<String>,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            mapbox_token: None,
            source_timezone: chrono_tz::UTC,
            display_timezone: chrono_tz::UTC,
            refresh_interval_ms: 1000,
            offset_unit: 0.000025,
            coordinate_precision: 7,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            labels: GroupLabels::default(),
            tile_url: None,
            copyright: None,
        }
    }
}

impl MapViewConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(serde_json::from_str(&raw)?)
    }

    /// `MAPBOX_TOKEN` and `MAP_DISPLAY_TZ` override the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("MAPBOX_TOKEN") {
            if !token.trim().is_empty() {
                self.mapbox_token = Some(token.trim().to_string());
            }
        }

        if let Ok(tz) = std::env::var("MAP_DISPLAY_TZ") {
            match Tz::from_str_insensitive(tz.as_str()) {
                Ok(tz) => self.display_timezone = tz,
                Err(e) => log::warn!("ignoring MAP_DISPLAY_TZ {}: {}", tz, e),
            }
        }

        self
    }

    pub fn has_paid_token(&self) -> bool {
        self.mapbox_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn placement(&self) -> Result<PlacementConfig, ConfigError> {
        let palette = self
            .palette
            .iter()
            .map(|hex| parse_hex_colour(hex).ok_or_else(|| ConfigError::Colour(hex.clone())))
            .collect::<Result<Vec<RGB8>, _>>()?;

        Ok(PlacementConfig {
            offset_unit: self.offset_unit,
            coordinate_precision: self.coordinate_precision,
            palette,
        })
    }

    pub fn tile_source(&self) -> TileSource {
        match (&self.tile_url, &self.mapbox_token) {
            (Some(url), _) if !url.is_empty() => TileSource {
                url_template: url.clone(),
                attribution: self.copyright.clone().unwrap_or_default(),
                access_token: self.mapbox_token.clone(),
                style_id: None,
            },
            (_, Some(token)) if !token.is_empty() => TileSource {
                url_template: MAPBOX_TILES_URL.to_string(),
                attribution: "© Mapbox © OpenStreetMap".to_string(),
                access_token: Some(token.clone()),
                style_id: Some("mapbox/streets-v11".to_string()),
            },
            _ => TileSource {
                url_template: OSM_TILES_URL.to_string(),
                attribution: "© OpenStreetMap".to_string(),
                access_token: None,
                style_id: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub url_template: String,
    pub attribution: String,
    pub access_token: Option<String>,
    pub style_id: Option<String>,
}

pub fn parse_hex_colour(hex: &str) -> Option<RGB8> {
    let hex = hex.trim().trim_start_matches('#');

    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some(RGB8 { r, g, b })
}

pub fn colour_to_hex(colour: RGB8) -> String {
    format!("#{:02X}{:02X}{:02X}", colour.r, colour.g, colour.b)
}
