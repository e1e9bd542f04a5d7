//! Bounded per-metric sample series with aggregations and trend.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::MetricKind;

/// Slope magnitude below which a series counts as stable.
pub const TREND_SLOPE_THRESHOLD: f64 = 0.1;
/// Points projected forward from the fitted line.
pub const FORECAST_POINTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregations {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    pub std_dev: f64,
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl Aggregations {
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Self {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            std_dev: variance.sqrt(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Change per sample from a least-squares fit against sample index.
    pub slope: f64,
    pub forecast: Vec<f64>,
}

impl Trend {
    pub fn compute(values: &[f64]) -> Self {
        let n = values.len();
        if n < 2 {
            return Self {
                forecast: values.last().map(|v| vec![*v; FORECAST_POINTS]).unwrap_or_default(),
                ..Self::default()
            };
        }
        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / nf;
        let mut num = 0.0;
        let mut den = 0.0;
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        let slope = if den == 0.0 { 0.0 } else { num / den };
        let intercept = mean_y - slope * mean_x;

        let direction = if slope > TREND_SLOPE_THRESHOLD {
            TrendDirection::Increasing
        } else if slope < -TREND_SLOPE_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };
        let forecast = (0..FORECAST_POINTS)
            .map(|k| intercept + slope * (nf + k as f64))
            .collect();

        Self {
            direction,
            slope,
            forecast,
        }
    }
}

/// Ring buffer of samples for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: MetricKind,
    pub samples: VecDeque<MetricSample>,
    pub capacity: usize,
    pub aggregations: Aggregations,
    pub trend: Trend,
}

impl MetricSeries {
    pub fn new(metric: MetricKind, capacity: usize) -> Self {
        Self {
            metric,
            samples: VecDeque::new(),
            capacity: capacity.max(1),
            aggregations: Aggregations::default(),
            trend: Trend::default(),
        }
    }

    /// Append a sample, dropping the oldest past capacity, and recompute
    /// aggregations and trend over the retained window.
    pub fn push(&mut self, sample: MetricSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        let values = self.values();
        self.aggregations = Aggregations::compute(&values);
        self.trend = Trend::compute(&values);
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
