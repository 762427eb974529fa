//! Loads records for a query and publishes them as the current [`MapState`].
//!
//! Every load takes the next generation number when it starts. Its result is
//! published only if that number is still the latest once the fetch resolves,
//! so an older load finishing late can never overwrite a newer one.

pub mod localize;
pub mod refresh;
pub mod source;

use crate::config::MapViewConfig;
use crate::directions::{MAX_ROUTE_WAYPOINTS, RouteProvider, unique_located_coordinates};
use crate::errors::{LoadError, RoutingError};
use crate::grouping::{FieldGroupingEngine, effective_group_by};
use crate::map_state::MapState;
use crate::records::{FieldType, LatLng, Record};
use crate::route_polyline::{RouteState, build_route_legs};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

pub use localize::localize_datetime_fields;
pub use refresh::{CoordinateRefreshTask, CoordinateResolver};
pub use source::{
    DefaultOrder, JsonRecordSource, MapQuery, RecordSource, SearchReadRequest, SearchReadResult,
};

pub(crate) struct Shared {
    generation: AtomicU64,
    state: RwLock<Arc<MapState>>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) async fn apply_position(
        &self,
        generation: u64,
        index: usize,
        position: LatLng,
    ) -> bool {
        let mut current = self.state.write().await;
        if !self.is_current(generation) {
            return false;
        }

        let mut next = MapState::clone(&current);
        if let Some(record) = next.records.get_mut(index) {
            record.set_position(position);
        }
        next.should_update_position = false;
        *current = Arc::new(next);

        true
    }

    pub(crate) async fn finish_fetching(&self, generation: u64) {
        let mut current = self.state.write().await;
        if !self.is_current(generation) || !current.fetching_coordinates {
            return;
        }

        let mut next = MapState::clone(&current);
        next.fetching_coordinates = false;
        *current = Arc::new(next);
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Applied(Arc<MapState>),
    /// A newer load started while this one was in flight; its result was dropped.
    Superseded,
}

impl LoadOutcome {
    pub fn state(&self) -> Option<&Arc<MapState>> {
        match self {
            LoadOutcome::Applied(state) => Some(state),
            LoadOutcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded)
    }
}

pub struct DataLoadCoordinator {
    shared: Arc<Shared>,
    source: Arc<dyn RecordSource>,
    route_provider: Option<Arc<dyn RouteProvider>>,
    resolver: Option<Arc<dyn CoordinateResolver>>,
    config: MapViewConfig,
    grouping: FieldGroupingEngine,
    refresh: Mutex<Option<CoordinateRefreshTask>>,
}

impl DataLoadCoordinator {
    pub fn new(source: Arc<dyn RecordSource>, config: MapViewConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                state: RwLock::new(Arc::new(MapState::default())),
            }),
            source,
            route_provider: None,
            resolver: None,
            grouping: FieldGroupingEngine::new(config.labels.clone()),
            config,
            refresh: Mutex::new(None),
        }
    }

    pub fn with_route_provider(mut self, provider: Arc<dyn RouteProvider>) -> Self {
        self.route_provider = Some(provider);
        self
    }

    pub fn with_coordinate_resolver(mut self, resolver: Arc<dyn CoordinateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &MapViewConfig {
        &self.config
    }

    pub async fn state(&self) -> Arc<MapState> {
        self.shared.state.read().await.clone()
    }

    pub fn latest_generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    pub async fn load(&self, query: &MapQuery) -> Result<LoadOutcome, LoadError> {
        self.stop_fetching_coordinates().await;

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let group_by = effective_group_by(&query.group_by, &query.fields);
        let request = SearchReadRequest::from_query(query, group_by.as_ref());

        debug!(
            "load {} of {} with {} fields",
            generation,
            request.model,
            request.specification.len()
        );

        let fetched = self.source.search_read(&request).await;

        if !self.shared.is_current(generation) {
            debug!("load {} superseded during fetch", generation);
            return Ok(LoadOutcome::Superseded);
        }

        let fetched = fetched.map_err(LoadError::Fetch)?;
        let count = fetched.length;
        let mut records = fetched.records;

        let mut datetime_fields: Vec<String> = Vec::new();
        for name in query
            .field_names
            .iter()
            .chain(group_by.as_ref().map(|spec| &spec.field))
        {
            let is_datetime = query
                .fields
                .get(name)
                .is_some_and(|field| field.field_type == FieldType::Datetime);
            if is_datetime && !datetime_fields.contains(name) {
                datetime_fields.push(name.clone());
            }
        }

        localize_datetime_fields(
            &mut records,
            &datetime_fields,
            self.config.source_timezone,
            self.config.display_timezone,
        );

        let groups = group_by.as_ref().map(|spec| {
            self.grouping
                .group(&records, &query.descriptor(&spec.field), spec.granularity)
        });

        let routes = self.fetch_routes(query, &records).await;

        if !self.shared.is_current(generation) {
            debug!("load {} superseded during routing", generation);
            return Ok(LoadOutcome::Superseded);
        }

        let use_paid_tiles = self.config.has_paid_token();
        let mut state = MapState {
            records,
            count,
            group_by,
            groups,
            routes,
            fetching_coordinates: false,
            should_update_position: true,
            use_paid_tiles,
            generation,
        };

        let pending = match (&self.resolver, use_paid_tiles) {
            (Some(_), false) => state.unlocated_indices(),
            _ => Vec::new(),
        };
        state.fetching_coordinates = !pending.is_empty();
        let state = Arc::new(state);

        {
            let mut current = self.shared.state.write().await;
            if !self.shared.is_current(generation) {
                return Ok(LoadOutcome::Superseded);
            }
            *current = state.clone();
        }

        info!(
            "load {}: {} of {} records, {} located",
            generation,
            state.records.len(),
            state.count,
            state.located_count()
        );

        if let (false, Some(resolver)) = (pending.is_empty(), &self.resolver) {
            let mut slot = self.refresh.lock().await;
            if self.shared.is_current(generation) {
                *slot = Some(CoordinateRefreshTask::spawn(
                    self.shared.clone(),
                    resolver.clone(),
                    generation,
                    pending,
                    self.config.refresh_interval(),
                ));
            }
        }

        Ok(LoadOutcome::Applied(state))
    }

    async fn fetch_routes(&self, query: &MapQuery, records: &[Record]) -> RouteState {
        if !query.routing || !self.config.has_paid_token() {
            return RouteState::NotRequested;
        }

        let Some(provider) = &self.route_provider else {
            return RouteState::NotRequested;
        };

        let waypoints = unique_located_coordinates(records);

        if waypoints.len() < 2 {
            return RouteState::Ready(Vec::new());
        }

        if waypoints.len() > MAX_ROUTE_WAYPOINTS {
            let error = RoutingError::TooManyWaypoints {
                count: waypoints.len(),
                max: MAX_ROUTE_WAYPOINTS,
            };
            warn!("{}", error);
            return RouteState::Failed(error.to_string());
        }

        match provider.route(&waypoints).await {
            Ok(routes) => RouteState::Ready(build_route_legs(&routes, true)),
            Err(e) => {
                warn!("routing failed: {}", e);
                RouteState::Failed(e.to_string())
            }
        }
    }

    pub async fn stop_fetching_coordinates(&self) {
        if let Some(task) = self.refresh.lock().await.take() {
            debug!("stopping coordinate refresh of load {}", task.generation());
            task.stop();
        }
    }

    /// Stops background work; results of loads still in flight are dropped.
    pub async fn shutdown(&self) {
        self.stop_fetching_coordinates().await;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }
}
