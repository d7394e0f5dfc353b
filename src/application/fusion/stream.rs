//! `DataStream` lifecycle and the bounded-queue producers the Fusion Engine
//! drives (spec.md §4.4).

use crate::domain::types::FusedEvent;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Idle,
    Connecting,
    Active,
    Paused,
    Error,
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub received: u64,
    pub dropped: u64,
}

/// Uniform producer/consumer surface for a price, news, or economic-calendar
/// feed. Implementations own their bounded queue; `get_event` never blocks
/// the fusion tick for longer than a single non-blocking poll.
#[async_trait]
pub trait DataStream: Send + Sync {
    fn id(&self) -> &str;
    async fn connect(&self) -> Result<(), String>;
    async fn start(&self) -> Result<(), String>;
    async fn stop(&self);
    async fn close(&self);
    async fn get_event(&self) -> Option<FusedEvent>;
    async fn get_stats(&self) -> StreamStats;
    async fn status(&self) -> StreamStatus;
}

/// Shared plumbing behind every concrete stream: a bounded mpsc queue with
/// oldest-dropped-when-full semantics and a status/stats cell.
struct StreamCore {
    id: String,
    status: RwLock<StreamStatus>,
    received: AtomicU64,
    dropped: AtomicU64,
    tx: mpsc::Sender<FusedEvent>,
    rx: tokio::sync::Mutex<mpsc::Receiver<FusedEvent>>,
}

impl StreamCore {
    fn new(id: &str, capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        Arc::new(Self {
            id: id.to_string(),
            status: RwLock::new(StreamStatus::Idle),
            received: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            tx,
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// Non-blocking publish used by feed producers; when the queue is full
    /// the event itself is dropped since `try_send` does not evict the head.
    /// Concrete streams that need true oldest-dropped semantics drain one
    /// slot before retrying.
    fn publish(&self, event: FusedEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.received.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                if let Ok(mut rx) = self.rx.try_lock() {
                    let _ = rx.try_recv();
                }
                match self.tx.try_send(event) {
                    Ok(()) => self.received.fetch_add(1, Ordering::Relaxed),
                    Err(_) => self.dropped.fetch_add(1, Ordering::Relaxed),
                };
                warn!(stream = self.id, "queue full, dropped oldest event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    async fn get_event(&self) -> Option<FusedEvent> {
        self.rx.lock().await.try_recv().ok()
    }

    async fn stats(&self) -> StreamStats {
        StreamStats {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    async fn set_status(&self, status: StreamStatus) {
        *self.status.write().await = status;
    }

    async fn status(&self) -> StreamStatus {
        *self.status.read().await
    }
}

/// A price-tick feed. Production code would drive `publish` from a broker
/// websocket task; `publish` is exposed so it can be wired up externally.
pub struct PriceStream {
    core: Arc<StreamCore>,
}

impl PriceStream {
    pub fn new(id: &str) -> Self {
        Self {
            core: StreamCore::new(id, DEFAULT_QUEUE_CAPACITY),
        }
    }

    pub fn publish(&self, event: FusedEvent) {
        self.core.publish(event);
    }
}

#[async_trait]
impl DataStream for PriceStream {
    fn id(&self) -> &str {
        &self.core.id
    }

    async fn connect(&self) -> Result<(), String> {
        self.core.set_status(StreamStatus::Connecting).await;
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn start(&self) -> Result<(), String> {
        if self.core.status().await == StreamStatus::Idle {
            return Err("stream must be connected before it can start".to_string());
        }
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn stop(&self) {
        self.core.set_status(StreamStatus::Paused).await;
    }

    async fn close(&self) {
        self.core.set_status(StreamStatus::Closed).await;
    }

    async fn get_event(&self) -> Option<FusedEvent> {
        self.core.get_event().await
    }

    async fn get_stats(&self) -> StreamStats {
        self.core.stats().await
    }

    async fn status(&self) -> StreamStatus {
        self.core.status().await
    }
}

/// A news-headline feed, same lifecycle as `PriceStream`.
pub struct NewsStream {
    core: Arc<StreamCore>,
}

impl NewsStream {
    pub fn new(id: &str) -> Self {
        Self {
            core: StreamCore::new(id, DEFAULT_QUEUE_CAPACITY),
        }
    }

    pub fn publish(&self, event: FusedEvent) {
        self.core.publish(event);
    }
}

#[async_trait]
impl DataStream for NewsStream {
    fn id(&self) -> &str {
        &self.core.id
    }

    async fn connect(&self) -> Result<(), String> {
        self.core.set_status(StreamStatus::Connecting).await;
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn start(&self) -> Result<(), String> {
        if self.core.status().await == StreamStatus::Idle {
            return Err("stream must be connected before it can start".to_string());
        }
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn stop(&self) {
        self.core.set_status(StreamStatus::Paused).await;
    }

    async fn close(&self) {
        self.core.set_status(StreamStatus::Closed).await;
    }

    async fn get_event(&self) -> Option<FusedEvent> {
        self.core.get_event().await
    }

    async fn get_stats(&self) -> StreamStats {
        self.core.stats().await
    }

    async fn status(&self) -> StreamStatus {
        self.core.status().await
    }
}

/// An economic-calendar feed, same lifecycle as the others.
pub struct EconomicCalendarStream {
    core: Arc<StreamCore>,
}

impl EconomicCalendarStream {
    pub fn new(id: &str) -> Self {
        Self {
            core: StreamCore::new(id, DEFAULT_QUEUE_CAPACITY),
        }
    }

    pub fn publish(&self, event: FusedEvent) {
        self.core.publish(event);
    }
}

#[async_trait]
impl DataStream for EconomicCalendarStream {
    fn id(&self) -> &str {
        &self.core.id
    }

    async fn connect(&self) -> Result<(), String> {
        self.core.set_status(StreamStatus::Connecting).await;
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn start(&self) -> Result<(), String> {
        if self.core.status().await == StreamStatus::Idle {
            return Err("stream must be connected before it can start".to_string());
        }
        self.core.set_status(StreamStatus::Active).await;
        Ok(())
    }

    async fn stop(&self) {
        self.core.set_status(StreamStatus::Paused).await;
    }

    async fn close(&self) {
        self.core.set_status(StreamStatus::Closed).await;
    }

    async fn get_event(&self) -> Option<FusedEvent> {
        self.core.get_event().await
    }

    async fn get_stats(&self) -> StreamStats {
        self.core.stats().await
    }

    async fn status(&self) -> StreamStatus {
        self.core.status().await
    }
}
