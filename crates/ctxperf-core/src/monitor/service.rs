//! The metrics monitor: sampling, history, alerting and reports.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::alerts::{Alert, AlertLog, AlertThresholds};
use super::error::{MonitorError, MonitorResult};
use super::health::{assess, HealthAssessment};
use super::provider::MetricsProvider;
use super::report::PerformanceReport;
use super::series::{MetricSample, MetricSeries};
use super::snapshot::{MetricKind, MetricsSnapshot};
use crate::schedule::ScheduledTask;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub sampling_interval_ms: u64,
    /// Snapshots kept for history queries.
    pub buffer_size: usize,
    /// Samples kept per metric series.
    pub series_capacity: usize,
    pub thresholds: AlertThresholds,
    pub alert_retention_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 5_000,
            buffer_size: 1_000,
            series_capacity: 1_000,
            thresholds: AlertThresholds::default(),
            alert_retention_ms: 86_400_000,
        }
    }
}

impl MonitorConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }
}

#[derive(Debug)]
struct MonitorState {
    snapshots: VecDeque<MetricsSnapshot>,
    series: BTreeMap<MetricKind, MetricSeries>,
    alerts: AlertLog,
    samples_taken: u64,
}

/// Collects snapshots from a [`MetricsProvider`], keeps bounded history and
/// per-metric series, and raises threshold and trend alerts.
pub struct MetricsMonitor {
    config: MonitorConfig,
    provider: Arc<dyn MetricsProvider>,
    state: Mutex<MonitorState>,
    task: Mutex<Option<ScheduledTask>>,
}

impl std::fmt::Debug for MetricsMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetricsMonitor {
    pub fn new(config: MonitorConfig, provider: Arc<dyn MetricsProvider>) -> Self {
        Self {
            config,
            provider,
            state: Mutex::new(MonitorState {
                snapshots: VecDeque::new(),
                series: BTreeMap::new(),
                alerts: AlertLog::default(),
                samples_taken: 0,
            }),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Sample the provider once and record the result.
    pub async fn get_current_metrics(&self) -> MonitorResult<MetricsSnapshot> {
        let (system, coordination, resources) = futures::try_join!(
            self.provider.system(),
            self.provider.coordination(),
            self.provider.resources(),
        )
        .map_err(|e| MonitorError::Provider(format!("{e:#}")))?;

        let snapshot = MetricsSnapshot::new(system, coordination, resources);
        self.record(snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Record an externally produced snapshot. Returns the alerts it raised.
    pub async fn record(&self, snapshot: MetricsSnapshot) -> Vec<Alert> {
        let mut state = self.state.lock().await;

        for (metric, value) in snapshot.values() {
            state
                .series
                .entry(metric)
                .or_insert_with(|| MetricSeries::new(metric, self.config.series_capacity))
                .push(MetricSample {
                    value,
                    timestamp: snapshot.timestamp,
                    tags: BTreeMap::new(),
                });
        }

        let retention = ChronoDuration::milliseconds(self.config.alert_retention_ms as i64);
        let pruned = state.alerts.prune(snapshot.timestamp, retention);
        if pruned > 0 {
            debug!(pruned, "expired alerts dropped");
        }
        let state = &mut *state;
        let mut raised = state.alerts.evaluate(&snapshot, &self.config.thresholds);
        raised.extend(
            state
                .alerts
                .evaluate_trends(state.series.values(), &self.config.thresholds, snapshot.timestamp),
        );

        state.snapshots.push_back(snapshot);
        while state.snapshots.len() > self.config.buffer_size.max(1) {
            state.snapshots.pop_front();
        }
        state.samples_taken += 1;
        raised
    }

    /// Start periodic sampling. Fails if sampling is already running.
    pub async fn start_monitoring(self: &Arc<Self>) -> MonitorResult<()> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(ScheduledTask::is_running) {
            return Err(MonitorError::AlreadyRunning);
        }

        let monitor: Weak<Self> = Arc::downgrade(self);
        *task = Some(ScheduledTask::every(
            "metrics-sampling",
            self.config.sampling_interval(),
            move || {
                let monitor = monitor.clone();
                async move {
                    let Some(monitor) = monitor.upgrade() else {
                        return;
                    };
                    if let Err(e) = monitor.get_current_metrics().await {
                        warn!(error = %e, "metrics sample failed");
                    }
                }
            },
        ));
        info!(interval_ms = self.config.sampling_interval_ms, "metrics monitoring started");
        Ok(())
    }

    /// Stop periodic sampling. Returns false if it was not running.
    pub async fn stop_monitoring(&self) -> bool {
        let task = self.task.lock().await.take();
        match task {
            Some(task) => {
                task.stop().await;
                info!("metrics monitoring stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_monitoring(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(ScheduledTask::is_running)
    }

    /// Most recent snapshots, oldest first. `None` returns the whole buffer.
    pub async fn get_metrics_history(&self, limit: Option<usize>) -> Vec<MetricsSnapshot> {
        let state = self.state.lock().await;
        let skip = limit.map_or(0, |n| state.snapshots.len().saturating_sub(n));
        state.snapshots.iter().skip(skip).cloned().collect()
    }

    pub async fn latest(&self) -> Option<MetricsSnapshot> {
        self.state.lock().await.snapshots.back().cloned()
    }

    pub async fn get_series(&self, metric: MetricKind) -> Option<MetricSeries> {
        self.state.lock().await.series.get(&metric).cloned()
    }

    pub async fn samples_taken(&self) -> u64 {
        self.state.lock().await.samples_taken
    }

    pub async fn get_alerts(&self, include_acknowledged: bool) -> Vec<Alert> {
        let state = self.state.lock().await;
        if include_acknowledged {
            state.alerts.all().to_vec()
        } else {
            state.alerts.active().cloned().collect()
        }
    }

    pub async fn acknowledge_alert(&self, id: Uuid) -> MonitorResult<()> {
        if self.state.lock().await.alerts.acknowledge(id) {
            Ok(())
        } else {
            Err(MonitorError::UnknownAlert { id })
        }
    }

    pub async fn assess_health(&self) -> HealthAssessment {
        let state = self.state.lock().await;
        assess(state.snapshots.back(), state.alerts.active(), &self.config.thresholds)
    }

    /// Report over the trailing `window`. Samples the provider first when
    /// nothing has been recorded yet.
    pub async fn generate_report(&self, window: Duration) -> MonitorResult<PerformanceReport> {
        if self.latest().await.is_none() {
            self.get_current_metrics().await?;
        }

        let window = ChronoDuration::from_std(window).unwrap_or_else(|_| ChronoDuration::days(36_500));
        let window_start = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let state = self.state.lock().await;
        let health = assess(state.snapshots.back(), state.alerts.active(), &self.config.thresholds);
        Ok(PerformanceReport::build(
            window_start,
            state.snapshots.back().cloned(),
            state.alerts.since(window_start),
            |metric| state.series.get(&metric),
            health,
            &self.config.thresholds,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::alerts::AlertKind;
    use crate::monitor::provider::ManualProvider;
    use crate::monitor::snapshot::{CoordinationMetrics, ResourceMetrics, SystemMetrics};

    fn snapshot(response_ms: f64) -> MetricsSnapshot {
        MetricsSnapshot::new(
            SystemMetrics {
                cpu_usage: 5.0,
                memory_usage_mb: 64.0,
                memory_total_mb: 1024.0,
            },
            CoordinationMetrics {
                response_time_ms: response_ms,
                throughput: 10.0,
                ..Default::default()
            },
            ResourceMetrics::default(),
        )
    }

    fn monitor(config: MonitorConfig) -> (Arc<MetricsMonitor>, Arc<ManualProvider>) {
        let provider = Arc::new(ManualProvider::new());
        let monitor = Arc::new(MetricsMonitor::new(config, provider.clone()));
        (monitor, provider)
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let (monitor, _) = monitor(MonitorConfig::default());
        let err = monitor.get_current_metrics().await.unwrap_err();
        assert!(matches!(err, MonitorError::Provider(_)));
        assert_eq!(monitor.samples_taken().await, 0);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let (monitor, _) = monitor(MonitorConfig {
            buffer_size: 3,
            ..Default::default()
        });
        for ms in [100.0, 200.0, 300.0, 400.0, 500.0] {
            monitor.record(snapshot(ms)).await;
        }

        let history = monitor.get_metrics_history(None).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].coordination.response_time_ms, 300.0);

        let last_two = monitor.get_metrics_history(Some(2)).await;
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[1].coordination.response_time_ms, 500.0);

        let series = monitor.get_series(MetricKind::ResponseTime).await.unwrap();
        assert_eq!(series.len(), 5);
    }

    #[tokio::test]
    async fn test_alert_persists_until_acknowledged() {
        let (monitor, _) = monitor(MonitorConfig::default());
        let raised = monitor.record(snapshot(1500.0)).await;
        assert_eq!(raised.len(), 1);

        monitor.record(snapshot(500.0)).await;
        let active = monitor.get_alerts(false).await;
        assert_eq!(active.len(), 1);

        monitor.acknowledge_alert(active[0].id).await.unwrap();
        assert!(monitor.get_alerts(false).await.is_empty());
        assert_eq!(monitor.get_alerts(true).await.len(), 1);

        let err = monitor.acknowledge_alert(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownAlert { .. }));
    }

    #[tokio::test]
    async fn test_rising_response_time_raises_trend_alert() {
        let (monitor, _) = monitor(MonitorConfig::default());
        let mut raised = Vec::new();
        for ms in [600.0, 700.0, 800.0, 900.0, 950.0] {
            raised.extend(monitor.record(snapshot(ms)).await);
        }

        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::Trend);
        assert_eq!(raised[0].metric, MetricKind::ResponseTime);
        assert_eq!(monitor.get_alerts(false).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sampling() {
        let (monitor, provider) = monitor(MonitorConfig {
            sampling_interval_ms: 100,
            ..Default::default()
        });
        provider.set(snapshot(50.0)).await;

        monitor.start_monitoring().await.unwrap();
        assert!(matches!(
            monitor.start_monitoring().await,
            Err(MonitorError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(monitor.stop_monitoring().await);
        assert_eq!(monitor.samples_taken().await, 3);
        assert!(!monitor.stop_monitoring().await);
        assert!(!monitor.is_monitoring().await);
    }

    #[tokio::test]
    async fn test_report_samples_when_empty() {
        let (monitor, provider) = monitor(MonitorConfig::default());
        provider.set(snapshot(900.0)).await;

        let report = monitor.generate_report(Duration::from_secs(3600)).await.unwrap();
        assert!(report.latest.is_some());
        assert_eq!(report.recommendations.len(), 1);
        let rt = report.trend(MetricKind::ResponseTime).unwrap();
        assert_eq!(rt.current, Some(900.0));
        assert_eq!(report.health.status, crate::monitor::health::HealthStatus::Healthy);
    }
}
