//! Fusion Engine: drives the cooperative fusion-tick and cleanup tasks that
//! turn a set of `DataStream`s into a `FusedSnapshot` stream (spec.md §4.4).

use crate::application::fusion::stream::{DataStream, StreamStatus};
use crate::domain::fusion::{FusionBuffer, TemporalAligner};
use crate::domain::types::FusedSnapshot;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

pub struct FusionEngineConfig {
    pub sync_window: Duration,
    pub cleanup_interval: std::time::Duration,
    pub active_buffer_cap: usize,
    pub archival_buffer_cap: usize,
}

impl Default for FusionEngineConfig {
    fn default() -> Self {
        Self {
            sync_window: Duration::milliseconds(100),
            cleanup_interval: std::time::Duration::from_secs(60),
            active_buffer_cap: 1000,
            archival_buffer_cap: 100,
        }
    }
}

struct SharedState {
    aligner: std::sync::Mutex<TemporalAligner>,
    buffer: std::sync::Mutex<FusionBuffer>,
}

/// Owns the streams plus the `TemporalAligner`/`FusionBuffer` pair and the
/// two cooperative tasks (fusion tick, cleanup) that drive them.
pub struct FusionEngine {
    streams: RwLock<HashMap<String, Arc<dyn DataStream>>>,
    shared: Arc<SharedState>,
    config: FusionEngineConfig,
    tick_handle: RwLock<Option<JoinHandle<()>>>,
    cleanup_handle: RwLock<Option<JoinHandle<()>>>,
}

impl FusionEngine {
    pub fn new(config: FusionEngineConfig) -> Self {
        let aligner = TemporalAligner::new(config.sync_window);
        let buffer = FusionBuffer::with_capacities(config.active_buffer_cap, config.archival_buffer_cap);
        Self {
            streams: RwLock::new(HashMap::new()),
            shared: Arc::new(SharedState {
                aligner: std::sync::Mutex::new(aligner),
                buffer: std::sync::Mutex::new(buffer),
            }),
            config,
            tick_handle: RwLock::new(None),
            cleanup_handle: RwLock::new(None),
        }
    }

    /// Registers a stream; must be called before `start()`.
    pub async fn add_stream(&self, stream: Arc<dyn DataStream>) {
        self.streams.write().await.insert(stream.id().to_string(), stream);
    }

    /// Launches the fusion-tick task (cadence `sync_window / 2`) and the
    /// cleanup task (cadence `cleanup_interval`).
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) {
        let stream_ids: Vec<String> = self.streams.read().await.keys().cloned().collect();
        let streams = self.streams.read().await.clone();
        let shared = self.shared.clone();
        let tick_cadence = (self.config.sync_window / 2)
            .to_std()
            .unwrap_or(std::time::Duration::from_millis(50));

        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_cadence);
            loop {
                interval.tick().await;
                let reference_time = Utc::now();

                let mut active_ids = Vec::new();
                for (id, stream) in streams.iter() {
                    if stream.status().await == StreamStatus::Active {
                        active_ids.push(id.clone());
                    }
                    while let Some(event) = stream.get_event().await {
                        let mut aligner = shared.aligner.lock().expect("aligner lock poisoned");
                        aligner.ingest(id, event);
                    }
                }

                let snapshot = {
                    let mut aligner = shared.aligner.lock().expect("aligner lock poisoned");
                    aligner.align(reference_time, &stream_ids, &active_ids)
                };

                let mut buffer = shared.buffer.lock().expect("fusion buffer lock poisoned");
                buffer.push(snapshot);
            }
        });

        let shared_cleanup = self.shared.clone();
        let cleanup_cadence = self.config.cleanup_interval;
        let cleanup_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_cadence);
            loop {
                interval.tick().await;
                let mut aligner = shared_cleanup.aligner.lock().expect("aligner lock poisoned");
                aligner.expire(Utc::now());
            }
        });

        *self.tick_handle.write().await = Some(tick_task);
        *self.cleanup_handle.write().await = Some(cleanup_task);
        info!("fusion engine started");
    }

    /// Signals and joins both tasks.
    pub async fn stop(&self) {
        if let Some(handle) = self.tick_handle.write().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        if let Some(handle) = self.cleanup_handle.write().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("fusion engine stopped");
    }

    /// Lock-free-in-spirit read of the active ring head; guarded by a plain
    /// mutex since contention is negligible (single producer, rare reads).
    pub fn latest_snapshot(&self) -> Option<FusedSnapshot> {
        let buffer = self.shared.buffer.lock().expect("fusion buffer lock poisoned");
        buffer.head().cloned()
    }

    pub fn latest(&self, k: usize) -> Vec<FusedSnapshot> {
        let buffer = self.shared.buffer.lock().expect("fusion buffer lock poisoned");
        buffer.latest(k).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fusion::stream::PriceStream;
    use crate::domain::types::{FusedEvent, PriceTick};
    use rust_decimal_macros::dec;
    use std::time::Duration as StdDuration;

    fn tick_event() -> FusedEvent {
        FusedEvent::Price(PriceTick {
            symbol: "EUR/USD".to_string(),
            timestamp_utc: Utc::now(),
            open: dec!(1.10),
            high: dec!(1.11),
            low: dec!(1.09),
            close: dec!(1.105),
            volume: dec!(100),
            bid: None,
            ask: None,
        })
    }

    #[tokio::test]
    async fn test_engine_produces_snapshot_after_tick() {
        let engine = FusionEngine::new(FusionEngineConfig {
            sync_window: Duration::milliseconds(50),
            cleanup_interval: StdDuration::from_secs(10),
            active_buffer_cap: 10,
            archival_buffer_cap: 5,
        });

        let price_stream = Arc::new(PriceStream::new("price:EURUSD"));
        price_stream.connect().await.unwrap();
        engine.add_stream(price_stream.clone()).await;
        engine.start().await;

        price_stream.publish(tick_event());
        tokio::time::sleep(StdDuration::from_millis(80)).await;

        let snapshot = engine.latest_snapshot();
        assert!(snapshot.is_some());

        engine.stop().await;
    }
}
