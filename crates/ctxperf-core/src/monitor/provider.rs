//! Metric sources for the monitor.
//!
//! A [`MetricsProvider`] supplies the three sub-metric groups that make up a
//! snapshot. [`SystemProbe`] reads the host process through `sysinfo`,
//! [`CoordinationTracker`] derives request metrics from recorded outcomes,
//! and [`ManualProvider`] returns whatever it was last given.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::snapshot::{CoordinationMetrics, MetricsSnapshot, ResourceMetrics, SystemMetrics};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the sub-metrics merged into a [`MetricsSnapshot`].
///
/// Each group is fetched independently; a failure in any one of them fails
/// the whole sample.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn system(&self) -> anyhow::Result<SystemMetrics>;

    async fn coordination(&self) -> anyhow::Result<CoordinationMetrics>;

    async fn resources(&self) -> anyhow::Result<ResourceMetrics>;
}

// ---------------------------------------------------------------------------
// CoordinationTracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct RequestRecord {
    at: Instant,
    latency: Duration,
    ok: bool,
}

#[derive(Debug, Default)]
struct TrackerState {
    requests: VecDeque<RequestRecord>,
    coordination: VecDeque<(Instant, Duration)>,
}

/// Sliding-window request statistics.
///
/// Callers record each handled request and each coordination hop; the
/// tracker reports means and rates over the trailing window.
#[derive(Debug)]
pub struct CoordinationTracker {
    window: Duration,
    state: Mutex<TrackerState>,
}

impl Default for CoordinationTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl CoordinationTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window: window.max(Duration::from_millis(1)),
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub async fn record_request(&self, latency: Duration, ok: bool) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.requests.push_back(RequestRecord { at: now, latency, ok });
        self.expire(&mut state, now);
    }

    pub async fn record_coordination(&self, latency: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        state.coordination.push_back((now, latency));
        self.expire(&mut state, now);
    }

    fn expire(&self, state: &mut TrackerState, now: Instant) {
        let cutoff = now.checked_sub(self.window);
        let stale = |at: Instant| cutoff.is_some_and(|c| at < c);
        while state.requests.front().is_some_and(|r| stale(r.at)) {
            state.requests.pop_front();
        }
        while state.coordination.front().is_some_and(|(at, _)| stale(*at)) {
            state.coordination.pop_front();
        }
    }

    /// Metrics over the trailing window. All zero when nothing was recorded.
    pub async fn metrics(&self) -> CoordinationMetrics {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        self.expire(&mut state, now);

        let count = state.requests.len();
        let response_time_ms = mean_ms(state.requests.iter().map(|r| r.latency));
        let failures = state.requests.iter().filter(|r| !r.ok).count();
        let coordination_latency_ms = mean_ms(state.coordination.iter().map(|(_, d)| *d));

        CoordinationMetrics {
            response_time_ms,
            throughput: count as f64 / self.window.as_secs_f64(),
            error_rate: if count == 0 { 0.0 } else { failures as f64 / count as f64 },
            coordination_latency_ms,
        }
    }
}

fn mean_ms(latencies: impl ExactSizeIterator<Item = Duration>) -> f64 {
    let n = latencies.len();
    if n == 0 {
        return 0.0;
    }
    latencies.map(|d| d.as_secs_f64() * 1000.0).sum::<f64>() / n as f64
}

// ---------------------------------------------------------------------------
// SystemProbe
// ---------------------------------------------------------------------------

/// Reads CPU and memory of the current process.
///
/// Coordination metrics come from an attached [`CoordinationTracker`] and
/// resource metrics are left empty.
pub struct SystemProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    tracker: Option<Arc<CoordinationTracker>>,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            tracker: None,
        }
    }

    pub fn with_tracker(mut self, tracker: Arc<CoordinationTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe")
            .field("pid", &self.pid)
            .field("tracker", &self.tracker.is_some())
            .finish()
    }
}

#[async_trait]
impl MetricsProvider for SystemProbe {
    async fn system(&self) -> anyhow::Result<SystemMetrics> {
        let pid = self.pid.ok_or_else(|| anyhow!("current process id unavailable"))?;
        let mut system = self.system.lock().await;
        system.refresh_memory();
        let _ = system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);
        let process = system
            .process(pid)
            .ok_or_else(|| anyhow!("process {pid} not found"))?;

        Ok(SystemMetrics {
            cpu_usage: f64::from(process.cpu_usage()),
            memory_usage_mb: process.memory() as f64 / BYTES_PER_MB,
            memory_total_mb: system.total_memory() as f64 / BYTES_PER_MB,
        })
    }

    async fn coordination(&self) -> anyhow::Result<CoordinationMetrics> {
        Ok(match &self.tracker {
            Some(tracker) => tracker.metrics().await,
            None => CoordinationMetrics::default(),
        })
    }

    async fn resources(&self) -> anyhow::Result<ResourceMetrics> {
        Ok(ResourceMetrics::default())
    }
}

// ---------------------------------------------------------------------------
// ManualProvider
// ---------------------------------------------------------------------------

/// Provider that reports values set by the caller.
#[derive(Debug, Default)]
pub struct ManualProvider {
    current: Mutex<Option<MetricsSnapshot>>,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the values reported from now on.
    pub async fn set(&self, snapshot: MetricsSnapshot) {
        *self.current.lock().await = Some(snapshot);
    }

    async fn current(&self) -> anyhow::Result<MetricsSnapshot> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("no metrics have been set"))
    }
}

#[async_trait]
impl MetricsProvider for ManualProvider {
    async fn system(&self) -> anyhow::Result<SystemMetrics> {
        Ok(self.current().await?.system)
    }

    async fn coordination(&self) -> anyhow::Result<CoordinationMetrics> {
        Ok(self.current().await?.coordination)
    }

    async fn resources(&self) -> anyhow::Result<ResourceMetrics> {
        Ok(self.current().await?.resources)
    }
}
