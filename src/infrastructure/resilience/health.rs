//! Health registry: named probes aggregated worst-of into a single status,
//! read by the Decision Engine after each iteration (spec.md §4.7 step 8).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

/// One probe's full result (spec.md §4.2): the status plus when it was
/// checked, how long the check took, and any probe-specific context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub metadata: HashMap<String, String>,
}

impl HealthRecord {
    fn new(status: HealthStatus, latency_ms: Option<u64>, metadata: HashMap<String, String>) -> Self {
        Self {
            status,
            checked_at: Utc::now(),
            latency_ms,
            metadata,
        }
    }
}

pub struct HealthRegistry {
    probes: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            probes: RwLock::new(HashMap::new()),
        }
    }

    /// Records a bare status with no latency/metadata context.
    pub fn report(&self, name: impl Into<String>, status: HealthStatus) {
        self.report_with(name, status, None, HashMap::new());
    }

    /// Records a full probe result, as a probe implementation that measures
    /// its own round-trip latency and wants to attach context would.
    pub fn report_with(
        &self,
        name: impl Into<String>,
        status: HealthStatus,
        latency_ms: Option<u64>,
        metadata: HashMap<String, String>,
    ) {
        self.probes
            .write()
            .expect("health registry lock poisoned")
            .insert(name.into(), HealthRecord::new(status, latency_ms, metadata));
    }

    /// Worst-of aggregation: any Unhealthy probe makes the whole system
    /// Unhealthy; any Degraded (with no Unhealthy) makes it Degraded.
    pub fn overall(&self) -> HealthStatus {
        self.probes
            .read()
            .expect("health registry lock poisoned")
            .values()
            .map(|record| record.status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Spec-named accessor (spec.md §4.2 "evaluate_all()"): a read-only
    /// snapshot of every probe's full record.
    pub fn evaluate_all(&self) -> HashMap<String, HealthRecord> {
        self.probes.read().expect("health registry lock poisoned").clone()
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}
