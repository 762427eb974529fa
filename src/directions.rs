use crate::errors::RoutingError;
use crate::records::{LatLng, Record};
use crate::route_polyline::{DirectionsResponse, Route};
use futures::future::BoxFuture;
use log::debug;
use url::Url;

pub const MAPBOX_API_BASE: &str = "https://api.mapbox.com";
pub const GOOGLE_MAPS_DIRECTIONS: &str = "https://www.google.com/maps/dir/?api=1";

/// Mapbox refuses more waypoints than this in one request.
pub const MAX_ROUTE_WAYPOINTS: usize = 25;

/// Source of precomputed routes through an ordered list of waypoints.
pub trait RouteProvider: Send + Sync {
    fn route<'a>(
        &'a self,
        waypoints: &'a [LatLng],
    ) -> BoxFuture<'a, Result<Vec<Route>, RoutingError>>;
}

/// Distinct located coordinates in record order.
pub fn unique_located_coordinates(records: &[Record]) -> Vec<LatLng> {
    let mut unique: Vec<LatLng> = Vec::new();

    for position in records.iter().filter_map(Record::position) {
        if !unique.contains(&position) {
            unique.push(position);
        }
    }

    unique
}

/// Google Maps directions link through every located record.
///
/// With routing on, the last coordinate is the destination.
pub fn google_maps_url(records: &[Record], routing: bool) -> String {
    let mut coordinates: Vec<String> = unique_located_coordinates(records)
        .iter()
        .map(|p| format!("{},{}", p.lat, p.lng))
        .collect();

    let mut url = GOOGLE_MAPS_DIRECTIONS.to_string();

    if routing {
        if let Some(destination) = coordinates.pop() {
            url.push_str(&format!("&destination={}", destination));
        }
    }

    if !coordinates.is_empty() {
        url.push_str(&format!("&waypoints={}", coordinates.join("|")));
    }

    url
}

pub struct MapboxDirections {
    client: reqwest::Client,
    access_token: String,
    profile: String,
    base_url: String,
}

impl MapboxDirections {
    pub fn new(access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            profile: "driving".to_string(),
            base_url: MAPBOX_API_BASE.to_string(),
        }
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn request_url(&self, waypoints: &[LatLng]) -> Result<Url, RoutingError> {
        let coordinates = waypoints
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<_>>()
            .join(";");

        let mut url = Url::parse(&format!(
            "{}/directions/v5/mapbox/{}/{}",
            self.base_url, self.profile, coordinates
        ))?;

        url.query_pairs_mut()
            .append_pair("access_token", &self.access_token)
            .append_pair("steps", "true")
            .append_pair("geometries", "geojson");

        Ok(url)
    }

    async fn fetch(&self, waypoints: &[LatLng]) -> Result<Vec<Route>, RoutingError> {
        if waypoints.len() > MAX_ROUTE_WAYPOINTS {
            return Err(RoutingError::TooManyWaypoints {
                count: waypoints.len(),
                max: MAX_ROUTE_WAYPOINTS,
            });
        }

        let url = self.request_url(waypoints)?;
        debug!("requesting route through {} waypoints", waypoints.len());

        let response: DirectionsResponse = self.client.get(url).send().await?.json().await?;

        match response.code.as_deref() {
            Some("Ok") | None => Ok(response.routes),
            Some(code) => Err(RoutingError::Api {
                code: code.to_string(),
                message: response.message,
            }),
        }
    }
}

impl RouteProvider for MapboxDirections {
    fn route<'a>(
        &'a self,
        waypoints: &'a [LatLng],
    ) -> BoxFuture<'a, Result<Vec<Route>, RoutingError>> {
        Box::pin(self.fetch(waypoints))
    }
}
