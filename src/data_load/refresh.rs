use super::Shared;
use crate::records::{LatLng, Record};
use futures::future::BoxFuture;
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Finds a position for a record that has none.
pub trait CoordinateResolver: Send + Sync {
    fn resolve<'a>(&'a self, record: &'a Record) -> BoxFuture<'a, Option<LatLng>>;
}

/// Resolves unlocated records one per tick until done or stopped.
///
/// Free geocoders ban clients that ask faster than about once a second, hence the pacing.
pub struct CoordinateRefreshTask {
    handle: JoinHandle<()>,
    generation: u64,
}

impl CoordinateRefreshTask {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        resolver: Arc<dyn CoordinateResolver>,
        generation: u64,
        pending: Vec<usize>,
        period: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let total = pending.len();
            let mut resolved_count = 0;

            for index in pending {
                ticker.tick().await;

                let record = {
                    let state = shared.state.read().await;
                    if !shared.is_current(generation) {
                        return;
                    }
                    match state.records.get(index) {
                        Some(record) => record.clone(),
                        None => continue,
                    }
                };

                let Some(position) = resolver.resolve(&record).await else {
                    debug!("no coordinates found for record {}", record.id);
                    continue;
                };

                if !shared.apply_position(generation, index, position).await {
                    return;
                }
                resolved_count += 1;
            }

            shared.finish_fetching(generation).await;
            info!("resolved coordinates for {}/{} records", resolved_count, total);
        });

        Self { handle, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for CoordinateRefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
