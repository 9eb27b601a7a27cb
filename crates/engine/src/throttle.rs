//! Per-agency serialization of outbound hosted-API calls.
//!
//! Hosted providers rate-limit per account, and one agency hammering a
//! provider must not starve another. [`RequestThrottle`] keeps one lane
//! per agency key: calls within a lane run strictly sequentially with a
//! minimum delay between dispatches, while lanes for different agencies
//! never block each other.
//!
//! Lanes are created lazily and evicted after an idle window by a
//! background sweep. Eviction never interrupts in-flight work: a caller
//! holds an `Arc` to its lane, so a swept-while-busy lane simply drops
//! out of the map and finishes on its own.
//!
//! Lanes are process-local; rate-limit coordination across multiple
//! processes is an accepted gap, mirrored by the job-route tracker.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Default minimum delay between two dispatches within one lane.
const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1_000);

/// Default idle window after which an unused lane is evicted.
const DEFAULT_IDLE_AFTER: Duration = Duration::from_secs(5 * 60);

/// How often the eviction loop sweeps idle lanes.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

struct Lane {
    /// Locked for the duration of a call; tokio mutexes queue fairly, so
    /// waiters within a lane run in FIFO order.
    gate: tokio::sync::Mutex<Option<Instant>>,
}

struct LaneEntry {
    lane: Arc<Lane>,
    last_used: Instant,
}

/// FIFO-per-key request throttle.
pub struct RequestThrottle {
    min_delay: Duration,
    idle_after: Duration,
    lanes: Mutex<HashMap<String, LaneEntry>>,
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_IDLE_AFTER)
    }
}

impl RequestThrottle {
    pub fn new(min_delay: Duration, idle_after: Duration) -> Self {
        Self {
            min_delay,
            idle_after,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Run `call` in the lane for `key`.
    ///
    /// The call starts only once every earlier call in the lane has
    /// finished and at least `min_delay` has elapsed since the previous
    /// dispatch. Calls in other lanes proceed independently.
    pub async fn run<F, T>(&self, key: &str, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let lane = self.lane(key);

        let mut last_dispatch = lane.gate.lock().await;
        if let Some(last) = *last_dispatch {
            let next_allowed = last + self.min_delay;
            let now = Instant::now();
            if next_allowed > now {
                tokio::time::sleep(next_allowed - now).await;
            }
        }
        *last_dispatch = Some(Instant::now());

        // The gate stays locked while the call runs: processing within a
        // lane is strictly sequential.
        call.await
    }

    /// Number of live lanes (for logging and tests).
    pub fn lane_count(&self) -> usize {
        self.lanes.lock().expect("lane map lock poisoned").len()
    }

    /// Evict lanes that are idle past the window and not in use.
    /// Returns how many were removed.
    pub fn sweep_idle(&self) -> usize {
        let mut lanes = self.lanes.lock().expect("lane map lock poisoned");
        let before = lanes.len();
        let idle_after = self.idle_after;
        lanes.retain(|_, entry| {
            // strong_count > 1 means a caller still holds the lane.
            Arc::strong_count(&entry.lane) > 1 || entry.last_used.elapsed() < idle_after
        });
        before - lanes.len()
    }

    /// Run the periodic idle-lane sweep until `cancel` is triggered.
    pub async fn run_eviction(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        tracing::info!(
            min_delay_ms = self.min_delay.as_millis() as u64,
            idle_after_secs = self.idle_after.as_secs(),
            "Request throttle eviction started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Request throttle eviction stopping");
                    break;
                }
                _ = interval.tick() => {
                    let evicted = self.sweep_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.lane_count(), "Evicted idle throttle lanes");
                    }
                }
            }
        }
    }

    /// Fetch or lazily create the lane for a key, refreshing its
    /// last-used stamp.
    fn lane(&self, key: &str) -> Arc<Lane> {
        let mut lanes = self.lanes.lock().expect("lane map lock poisoned");
        let entry = lanes.entry(key.to_string()).or_insert_with(|| LaneEntry {
            lane: Arc::new(Lane {
                gate: tokio::sync::Mutex::new(None),
            }),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        Arc::clone(&entry.lane)
    }
}
