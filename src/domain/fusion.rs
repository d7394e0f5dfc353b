//! Temporal alignment and bounded buffering for the Input Fusion Engine
//! (spec.md §4.4). Pure, synchronous logic; the cooperative tasks that drive
//! it on a cadence live in `application::fusion`.

use crate::domain::types::{FusedEvent, FusedSnapshot, SyncStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

const DEFAULT_PER_STREAM_BUFFER_CAP: usize = 1000;
const DEFAULT_ACTIVE_RING_CAP: usize = 1000;
const DEFAULT_ARCHIVAL_RING_CAP: usize = 100;

/// Per-stream bounded buffer of recent events plus the alignment rule that
/// picks the event closest to a reference time within `sync_window`.
pub struct TemporalAligner {
    sync_window: Duration,
    per_stream_cap: usize,
    buffers: HashMap<String, VecDeque<FusedEvent>>,
}

fn event_timestamp(event: &FusedEvent) -> DateTime<Utc> {
    match event {
        FusedEvent::Price(p) => p.timestamp_utc,
        FusedEvent::News(n) => n.timestamp_utc,
        FusedEvent::Economic(e) => e.scheduled_utc,
    }
}

impl TemporalAligner {
    pub fn new(sync_window: Duration) -> Self {
        Self {
            sync_window,
            per_stream_cap: DEFAULT_PER_STREAM_BUFFER_CAP,
            buffers: HashMap::new(),
        }
    }

    pub fn with_per_stream_cap(mut self, cap: usize) -> Self {
        self.per_stream_cap = cap;
        self
    }

    pub fn sync_window(&self) -> Duration {
        self.sync_window
    }

    /// Buffers an event under `stream_id`; if the per-stream buffer is at
    /// capacity, the oldest event is dropped to make room.
    pub fn ingest(&mut self, stream_id: &str, event: FusedEvent) {
        let buffer = self.buffers.entry(stream_id.to_string()).or_default();
        if buffer.len() >= self.per_stream_cap {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    /// Drops buffered events older than `reference_time - sync_window` across
    /// all streams.
    pub fn expire(&mut self, reference_time: DateTime<Utc>) {
        let cutoff = reference_time - self.sync_window;
        for buffer in self.buffers.values_mut() {
            while let Some(front) = buffer.front() {
                if event_timestamp(front) < cutoff {
                    buffer.pop_front();
                } else {
                    break;
                }
            }
        }
    }

    /// For each of `stream_ids`, picks the buffered event closest in time to
    /// `reference_time` within the sync window; streams with no such event
    /// are simply absent from the result. `active_stream_ids` identifies
    /// which streams are currently ACTIVE, used to compute `sync_status`.
    ///
    /// Deliberately does not call `expire` itself: expiry ages buffers on the
    /// cleanup loop's own cadence (spec.md §4.4), independent of this tick's
    /// `reference_time`. Expiring here at `sync_window` would discard any
    /// event lagging past the window before its lag could ever be observed,
    /// making DELAYED/STALE unreachable.
    pub fn align(
        &mut self,
        reference_time: DateTime<Utc>,
        stream_ids: &[String],
        active_stream_ids: &[String],
    ) -> FusedSnapshot {
        let mut events = HashMap::new();
        let mut max_lag = Duration::zero();

        for stream_id in stream_ids {
            if let Some(buffer) = self.buffers.get(stream_id) {
                let closest = buffer.iter().min_by_key(|e| {
                    (event_timestamp(e) - reference_time).num_milliseconds().abs()
                });
                if let Some(event) = closest {
                    // Track the lag of every stream's closest event, even one
                    // outside the window, so sync_status can reach DELAYED/STALE
                    // instead of only ever SYNCED.
                    let lag = (event_timestamp(event) - reference_time).abs();
                    max_lag = max_lag.max(lag);
                    if lag <= self.sync_window {
                        events.insert(stream_id.clone(), event.clone());
                    }
                }
            }
        }

        let all_required_active = stream_ids.iter().all(|id| active_stream_ids.contains(id));

        let sync_status = if !all_required_active {
            SyncStatus::Disconnected
        } else if max_lag <= self.sync_window {
            SyncStatus::Synced
        } else if max_lag <= self.sync_window * 5 {
            SyncStatus::Delayed
        } else {
            SyncStatus::Stale
        };

        FusedSnapshot {
            reference_time,
            events,
            sync_status,
        }
    }
}

/// Dual ring: an active ring that absorbs writes, and an archival ring that
/// receives whatever the active ring evicts (spec.md §4.4).
pub struct FusionBuffer {
    active: VecDeque<FusedSnapshot>,
    archival: VecDeque<FusedSnapshot>,
    active_cap: usize,
    archival_cap: usize,
}

impl FusionBuffer {
    pub fn new() -> Self {
        Self {
            active: VecDeque::new(),
            archival: VecDeque::new(),
            active_cap: DEFAULT_ACTIVE_RING_CAP,
            archival_cap: DEFAULT_ARCHIVAL_RING_CAP,
        }
    }

    pub fn with_capacities(active_cap: usize, archival_cap: usize) -> Self {
        Self {
            active: VecDeque::new(),
            archival: VecDeque::new(),
            active_cap,
            archival_cap,
        }
    }

    /// Pushes to the active ring; if full, the evicted (oldest) snapshot is
    /// written into the archival ring, itself evicting its own oldest entry
    /// once full.
    pub fn push(&mut self, snapshot: FusedSnapshot) {
        if self.active.len() >= self.active_cap
            && let Some(evicted) = self.active.pop_front()
        {
            if self.archival.len() >= self.archival_cap {
                self.archival.pop_front();
            }
            self.archival.push_back(evicted);
        }
        self.active.push_back(snapshot);
    }

    /// Most recent `k` snapshots, newest first.
    pub fn latest(&self, k: usize) -> Vec<&FusedSnapshot> {
        self.active.iter().rev().take(k).collect()
    }

    /// All snapshots (active ring only) whose `reference_time` falls in
    /// `[t_start, t_end]`, oldest first.
    pub fn range(&self, t_start: DateTime<Utc>, t_end: DateTime<Utc>) -> Vec<&FusedSnapshot> {
        self.active
            .iter()
            .filter(|s| s.reference_time >= t_start && s.reference_time <= t_end)
            .collect()
    }

    pub fn by_index(&self, i: usize) -> Option<&FusedSnapshot> {
        self.active.get(i)
    }

    pub fn head(&self) -> Option<&FusedSnapshot> {
        self.active.back()
    }

    /// Clears both rings. The only way archival entries are removed.
    pub fn clear(&mut self) {
        self.active.clear();
        self.archival.clear();
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn archival_len(&self) -> usize {
        self.archival.len()
    }
}

impl Default for FusionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PriceTick;
    use rust_decimal_macros::dec;

    fn price_event(ts: DateTime<Utc>) -> FusedEvent {
        FusedEvent::Price(PriceTick {
            symbol: "EUR/USD".to_string(),
            timestamp_utc: ts,
            open: dec!(1.10),
            high: dec!(1.11),
            low: dec!(1.09),
            close: dec!(1.105),
            volume: dec!(100),
            bid: None,
            ask: None,
        })
    }

    fn snapshot(reference_time: DateTime<Utc>) -> FusedSnapshot {
        FusedSnapshot {
            reference_time,
            events: HashMap::new(),
            sync_status: SyncStatus::Synced,
        }
    }

    #[test]
    fn test_align_picks_event_within_window() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference - Duration::milliseconds(50)));

        let snap = aligner.align(
            reference,
            &["price".to_string()],
            &["price".to_string()],
        );
        assert!(snap.events.contains_key("price"));
        assert_eq!(snap.sync_status, SyncStatus::Synced);
    }

    #[test]
    fn test_align_excludes_event_outside_window() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference - Duration::milliseconds(500)));

        let snap = aligner.align(
            reference,
            &["price".to_string()],
            &["price".to_string()],
        );
        assert!(!snap.events.contains_key("price"));
    }

    #[test]
    fn test_align_reports_delayed_when_lag_within_five_times_window() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference - Duration::milliseconds(300)));

        let snap = aligner.align(reference, &["price".to_string()], &["price".to_string()]);
        assert_eq!(snap.sync_status, SyncStatus::Delayed);
        assert!(!snap.events.contains_key("price"));
    }

    #[test]
    fn test_align_reports_stale_when_lag_exceeds_five_times_window() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference - Duration::milliseconds(700)));

        let snap = aligner.align(reference, &["price".to_string()], &["price".to_string()]);
        assert_eq!(snap.sync_status, SyncStatus::Stale);
    }

    #[test]
    fn test_align_disconnected_when_stream_not_active() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference));

        let snap = aligner.align(reference, &["price".to_string()], &[]);
        assert_eq!(snap.sync_status, SyncStatus::Disconnected);
    }

    #[test]
    fn test_expire_drops_stale_events() {
        let reference = Utc::now();
        let mut aligner = TemporalAligner::new(Duration::milliseconds(100));
        aligner.ingest("price", price_event(reference - Duration::seconds(10)));
        aligner.expire(reference);

        let snap = aligner.align(reference, &["price".to_string()], &["price".to_string()]);
        assert!(!snap.events.contains_key("price"));
    }

    #[test]
    fn test_fusion_buffer_evicts_to_archival_when_full() {
        let mut buffer = FusionBuffer::with_capacities(2, 2);
        let base = Utc::now();
        buffer.push(snapshot(base));
        buffer.push(snapshot(base + Duration::seconds(1)));
        buffer.push(snapshot(base + Duration::seconds(2)));

        assert_eq!(buffer.active_len(), 2);
        assert_eq!(buffer.archival_len(), 1);
    }

    #[test]
    fn test_fusion_buffer_latest_returns_newest_first() {
        let mut buffer = FusionBuffer::new();
        let base = Utc::now();
        buffer.push(snapshot(base));
        buffer.push(snapshot(base + Duration::seconds(1)));

        let latest = buffer.latest(1);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].reference_time, base + Duration::seconds(1));
    }

    #[test]
    fn test_fusion_buffer_clear_empties_both_rings() {
        let mut buffer = FusionBuffer::with_capacities(1, 1);
        let base = Utc::now();
        buffer.push(snapshot(base));
        buffer.push(snapshot(base + Duration::seconds(1)));
        buffer.clear();
        assert_eq!(buffer.active_len(), 0);
        assert_eq!(buffer.archival_len(), 0);
    }
}
