//! Latency sample aggregation
//!
//! Per-target: [`LatencySamples`] folds the outcomes of every probe attempt
//! into a mean over the successful ones. Per-report: [`ReportSummary`]
//! describes a finished batch of targets for logging.

use crate::models::{ProbeOutcome, Target};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcomes of all attempts against one target
#[derive(Debug, Clone, Default)]
pub struct LatencySamples {
    successes: Vec<Duration>,
    failures: Vec<String>,
}

impl LatencySamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = ProbeOutcome>,
    {
        let mut samples = Self::new();
        for outcome in outcomes {
            samples.push(outcome);
        }
        samples
    }

    pub fn push(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success(rtt) => self.successes.push(rtt),
            ProbeOutcome::Failure(reason) => self.failures.push(reason),
        }
    }

    /// Mean of the successful attempts, `None` when nothing succeeded
    pub fn mean(&self) -> Option<Duration> {
        if self.successes.is_empty() {
            return None;
        }
        let total: Duration = self.successes.iter().sum();
        Some(total / self.successes.len() as u32)
    }

    pub fn min(&self) -> Option<Duration> {
        self.successes.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.successes.iter().max().copied()
    }

    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    pub fn attempts(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Failure reasons in attempt order
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn has_success(&self) -> bool {
        !self.successes.is_empty()
    }
}

/// Summary of one finished report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub reachable: usize,
    pub fastest_ms: Option<f64>,
    pub median_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    pub std_dev_ms: Option<f64>,
}

impl ReportSummary {
    pub fn from_targets(targets: &[Target]) -> Self {
        let mut latencies: Vec<f64> = targets
            .iter()
            .filter(|t| t.is_reachable())
            .map(|t| t.measured_latency.as_secs_f64() * 1000.0)
            .collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        Self {
            total: targets.len(),
            reachable: latencies.len(),
            fastest_ms: latencies.first().copied(),
            median_ms: percentile(&latencies, 50.0),
            mean_ms: mean,
            std_dev_ms: mean.map(|m| standard_deviation(&latencies, m)),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.reachable as f64 / self.total as f64 * 100.0
        }
    }
}

/// Linear-interpolated percentile of already sorted values
fn percentile(sorted_values: &[f64], percentile: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }

    let index = (percentile / 100.0) * (sorted_values.len() as f64 - 1.0);
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        Some(sorted_values[lower_index])
    } else {
        let lower_value = sorted_values[lower_index];
        let upper_value = sorted_values[upper_index];
        let weight = index - lower_index as f64;
        Some(lower_value + weight * (upper_value - lower_value))
    }
}

/// Sample standard deviation
fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }

    let variance = values.iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>() / (values.len() - 1) as f64;

    variance.sqrt()
}
