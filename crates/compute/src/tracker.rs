//! In-memory map of job id -> accepting pool.
//!
//! The tracker is an explicit injected service with its own lifecycle,
//! not an ambient global: `main` creates one, hands it to the router, and
//! spawns [`JobRouteTracker::run_eviction`] next to the other background
//! loops. Entries older than the configured bound are evicted so
//! abandoned jobs cannot grow the map forever.
//!
//! The map is process-local. After a restart (or on another instance)
//! lookups default to the serverless pool, which answers status queries
//! for any job it ever accepted; routing continuity across processes is
//! an accepted loss, not a bug to paper over here.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::backend::PoolKind;

/// Default maximum age of a route entry before eviction.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60); // 1 hour

/// How often the eviction loop sweeps the map.
const EVICTION_INTERVAL: Duration = Duration::from_secs(10 * 60);

struct RouteEntry {
    pool: PoolKind,
    recorded_at: Instant,
}

/// Remembers which pool accepted each submitted job.
pub struct JobRouteTracker {
    entries: RwLock<HashMap<String, RouteEntry>>,
    max_age: Duration,
}

impl Default for JobRouteTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}

impl JobRouteTracker {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age,
        }
    }

    /// Record which pool accepted a job.
    pub fn record(&self, job_id: &str, pool: PoolKind) {
        let mut entries = self.entries.write().expect("route map lock poisoned");
        entries.insert(
            job_id.to_string(),
            RouteEntry {
                pool,
                recorded_at: Instant::now(),
            },
        );
    }

    /// The pool to ask about a job. Unknown ids (evicted, or submitted
    /// before a restart) default to the serverless pool.
    pub fn pool_for(&self, job_id: &str) -> PoolKind {
        self.entries
            .read()
            .expect("route map lock poisoned")
            .get(job_id)
            .map(|e| e.pool)
            .unwrap_or(PoolKind::Serverless)
    }

    /// Number of tracked routes (for logging and tests).
    pub fn len(&self) -> usize {
        self.entries.read().expect("route map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries older than the configured bound. Returns how many
    /// were removed.
    pub fn evict_stale(&self) -> usize {
        let mut entries = self.entries.write().expect("route map lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| e.recorded_at.elapsed() < self.max_age);
        before - entries.len()
    }

    /// Run the periodic eviction loop until `cancel` is triggered.
    pub async fn run_eviction(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        tracing::info!(
            max_age_secs = self.max_age.as_secs(),
            interval_secs = EVICTION_INTERVAL.as_secs(),
            "Job route eviction started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job route eviction stopping");
                    break;
                }
                _ = interval.tick() => {
                    let evicted = self.evict_stale();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.len(), "Evicted stale job routes");
                    }
                }
            }
        }
    }
}
