//! Probe execution engine
//!
//! This module contains the measurement side of the pipeline:
//! - [`strategy`]: one round trip by ICMP socket, `ping` binary or HTTP GET
//! - [`capability`]: which ICMP strategies this host can use
//! - [`icmp`]: the blocking echo primitive behind the socket strategy
//!
//! [`ProbeEngine`] repeats attempts per strategy, falls back between
//! strategies, and runs a whole group of targets under a concurrency cap.

pub mod capability;
pub mod icmp;
pub mod strategy;

pub use capability::Capabilities;
pub use strategy::{CommandStrategy, HttpStrategy, IcmpStrategy, ProbeStrategy};

use crate::{
    client::ClientFactory,
    error::{collect_attempts, run_strategies, AppError, Result, RetryPolicy},
    logging::Logger,
    models::{Config, ProbeOutcome, Target},
    stats::LatencySamples,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::Semaphore;

/// Counters for one engine, shared by its clones
#[derive(Debug, Default)]
struct EngineCounters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    probed: AtomicUsize,
    reachable: AtomicUsize,
    panicked: AtomicUsize,
}

/// Snapshot of [`EngineCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Highest number of probes that ran at once
    pub peak_concurrency: usize,
    pub probed: usize,
    pub reachable: usize,
    /// Probe units that panicked and were recorded as unreachable
    pub panicked: usize,
}

/// Decrements the in-flight counter when a probe unit ends, even by panic
struct InFlight<'a>(&'a EngineCounters);

impl<'a> InFlight<'a> {
    fn enter(counters: &'a EngineCounters) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Measures targets with an ordered list of strategies
#[derive(Clone)]
pub struct ProbeEngine {
    strategies: Arc<Vec<Arc<dyn ProbeStrategy>>>,
    policy: RetryPolicy,
    concurrency: usize,
    logger: Logger,
    counters: Arc<EngineCounters>,
}

impl ProbeEngine {
    pub fn new(strategies: Vec<Arc<dyn ProbeStrategy>>, policy: RetryPolicy, concurrency: usize, logger: &Logger) -> Self {
        Self {
            strategies: Arc::new(strategies),
            policy,
            concurrency: concurrency.max(1),
            logger: logger.child("probe"),
            counters: Arc::new(EngineCounters::default()),
        }
    }

    /// Engine for IP targets using whatever ICMP strategies `capabilities` allow
    pub async fn icmp(config: &Config, capabilities: &Capabilities, logger: &Logger) -> Result<Self> {
        let strategies = capabilities.strategies(config.probe_timeout(), logger).await?;
        let policy = RetryPolicy::immediate(config.probe_attempts as usize, config.probe_timeout());
        Ok(Self::new(strategies, policy, config.concurrency, logger))
    }

    /// Engine for website targets
    pub fn web(config: &Config, logger: &Logger) -> Result<Self> {
        let client = ClientFactory::web_client(config.web_timeout(), crate::defaults::MAX_REDIRECTS)?;
        let strategies: Vec<Arc<dyn ProbeStrategy>> = vec![Arc::new(HttpStrategy::new(client))];
        let policy = RetryPolicy::immediate(config.probe_attempts as usize, config.web_timeout());
        Ok(Self::new(strategies, policy, config.web_concurrency, logger))
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Measure one target, recording the mean of its successful attempts
    ///
    /// Strategies are tried in order; the next one only runs if every attempt
    /// of the previous one failed. A target with no success anywhere is
    /// returned untested.
    pub async fn probe(&self, mut target: Target) -> Target {
        let measured = {
            let policy = &self.policy;
            let subject = &target;
            run_strategies(self.strategies.as_slice(), |_, strategy| async move {
                let outcomes = collect_attempts(policy, |attempt| strategy.attempt(subject, attempt)).await;
                let samples = LatencySamples::from_outcomes(outcomes.into_iter().map(|outcome| match outcome {
                    Ok(rtt) => ProbeOutcome::Success(rtt),
                    Err(e) => ProbeOutcome::Failure(e.to_string()),
                }));
                if samples.has_success() {
                    Ok(samples)
                } else {
                    let reason = samples.failures().last().cloned().unwrap_or_default();
                    Err(AppError::probe(format!("{} failed every attempt: {}", strategy.name(), reason)))
                }
            })
            .await
        };

        self.counters.probed.fetch_add(1, Ordering::SeqCst);
        match measured {
            Ok((index, samples)) => {
                target.record(&samples);
                self.counters.reachable.fetch_add(1, Ordering::SeqCst);
                self.logger
                    .debug("target measured")
                    .field("target", &target.label)
                    .field("strategy", self.strategies[index].name())
                    .field("successes", samples.success_count())
                    .field("latency_ms", target.measured_latency.as_millis() as u64)
                    .log()
                    .await;
            }
            Err(e) => {
                target.mark_unreachable();
                self.logger
                    .debug("target unreachable")
                    .field("target", &target.label)
                    .field("strategies_tried", e.attempts)
                    .error_info(&e.last_error)
                    .log()
                    .await;
            }
        }
        target
    }

    /// Measure every target with at most `concurrency` probes in flight
    ///
    /// Each target is moved into its own task and handed back through the
    /// join, in input order. A task that panics yields its target untested.
    pub async fn probe_all(&self, targets: Vec<Target>) -> Vec<Target> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(targets.len());
        let mut fallbacks = Vec::with_capacity(targets.len());

        for target in targets {
            fallbacks.push(target.clone());
            let engine = self.clone();
            let permits = permits.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::internal(format!("probe semaphore closed: {}", e)))?;
                let _in_flight = InFlight::enter(&engine.counters);
                Ok::<Target, AppError>(engine.probe(target).await)
            }));
        }

        let joined = join_all(handles).await;
        let mut measured = Vec::with_capacity(joined.len());
        for (result, mut fallback) in joined.into_iter().zip(fallbacks) {
            match result {
                Ok(Ok(target)) => measured.push(target),
                Ok(Err(e)) => {
                    self.logger
                        .warn("probe unit failed")
                        .field("target", &fallback.label)
                        .error_info(&e)
                        .log()
                        .await;
                    fallback.mark_unreachable();
                    measured.push(fallback);
                }
                Err(e) => {
                    if e.is_panic() {
                        self.counters.panicked.fetch_add(1, Ordering::SeqCst);
                    }
                    self.logger
                        .warn("probe unit panicked")
                        .field("target", &fallback.label)
                        .field("error", e.to_string())
                        .log()
                        .await;
                    fallback.mark_unreachable();
                    measured.push(fallback);
                }
            }
        }
        measured
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            peak_concurrency: self.counters.peak.load(Ordering::SeqCst),
            probed: self.counters.probed.load(Ordering::SeqCst),
            reachable: self.counters.reachable.load(Ordering::SeqCst),
            panicked: self.counters.panicked.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Carrier, SourcePriority};
    use async_trait::async_trait;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    /// Scripted strategy: each attempt returns the next reply in the cycle
    struct Scripted {
        name: &'static str,
        replies: Vec<Option<u64>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, replies: Vec<Option<u64>>) -> Self {
            Self { name, replies, delay: Duration::ZERO, calls: AtomicUsize::new(0) }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ProbeStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, target: &Target, attempt: usize) -> Result<Duration> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if target.label.contains("boom") {
                panic!("strategy blew up");
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.replies[attempt % self.replies.len()] {
                Some(ms) => Ok(Duration::from_millis(ms)),
                None => Err(AppError::timeout("no reply")),
            }
        }
    }

    fn engine(strategies: Vec<Arc<dyn ProbeStrategy>>, concurrency: usize) -> ProbeEngine {
        let policy = RetryPolicy::immediate(3, Duration::from_secs(1));
        ProbeEngine::new(strategies, policy, concurrency, &Logger::disabled())
    }

    fn node(index: u8) -> Target {
        Target::carrier_node(Carrier::Unicom, &format!("r{}", index), Ipv4Addr::new(10, 0, 0, index), SourcePriority::Regional)
    }

    #[tokio::test]
    async fn test_mean_of_successful_attempts_only() {
        let probe = engine(vec![Arc::new(Scripted::new("a", vec![Some(10), None, Some(30)]))], 4);
        let target = probe.probe(node(1)).await;

        assert!(target.tested);
        assert_eq!(target.measured_latency, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_falls_back_to_second_strategy() {
        let primary = Arc::new(Scripted::new("primary", vec![None]));
        let secondary = Arc::new(Scripted::new("secondary", vec![Some(8)]));
        let probe = engine(vec![primary.clone(), secondary.clone()], 4);

        let target = probe.probe(node(1)).await;
        assert!(target.is_reachable());
        assert_eq!(target.measured_latency, Duration::from_millis(8));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 3);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_fallback_after_success() {
        let primary = Arc::new(Scripted::new("primary", vec![None, Some(5)]));
        let secondary = Arc::new(Scripted::new("secondary", vec![Some(1)]));
        let probe = engine(vec![primary, secondary.clone()], 4);

        let target = probe.probe(node(1)).await;
        assert_eq!(target.measured_latency, Duration::from_millis(5));
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_attempts_failing_is_unreachable() {
        let probe = engine(vec![Arc::new(Scripted::new("a", vec![None]))], 4);
        let target = probe.probe(node(1)).await;

        assert!(!target.tested);
        assert!(target.measured_latency.is_zero());
    }

    #[tokio::test]
    async fn test_no_strategies_is_unreachable() {
        let probe = engine(Vec::new(), 4);
        assert!(!probe.probe(node(1)).await.tested);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let strategy = Arc::new(Scripted::new("slow", vec![Some(1)]).slow(Duration::from_millis(20)));
        let probe = engine(vec![strategy], 100);

        let targets: Vec<Target> = (0..120).map(|i| node(i as u8)).collect();
        let measured = probe.probe_all(targets).await;

        assert_eq!(measured.len(), 120);
        assert!(measured.iter().all(|t| t.tested));
        let stats = probe.stats();
        assert!(stats.peak_concurrency <= 100, "peak was {}", stats.peak_concurrency);
        assert!(stats.peak_concurrency > 1);
        assert_eq!(stats.probed, 120);
    }

    #[tokio::test]
    async fn test_small_cap_serializes() {
        let strategy = Arc::new(Scripted::new("slow", vec![Some(1)]).slow(Duration::from_millis(5)));
        let probe = engine(vec![strategy], 1);

        probe.probe_all((0..5).map(node).collect()).await;
        assert_eq!(probe.stats().peak_concurrency, 1);
    }

    #[tokio::test]
    async fn test_panic_is_recovered_per_unit() {
        let probe = engine(vec![Arc::new(Scripted::new("a", vec![Some(4)]))], 8);
        let mut targets: Vec<Target> = (1..=3).map(node).collect();
        targets.push(Target::relay("boom", Ipv4Addr::new(10, 9, 9, 9)));

        let measured = probe.probe_all(targets).await;
        assert_eq!(measured.len(), 4);
        assert_eq!(measured.iter().filter(|t| t.tested).count(), 3);

        let exploded = measured.iter().find(|t| t.label == "boom").unwrap();
        assert!(!exploded.tested);
        assert_eq!(probe.stats().panicked, 1);
    }

    #[tokio::test]
    async fn test_probe_all_preserves_input_order() {
        let probe = engine(vec![Arc::new(Scripted::new("a", vec![Some(2)]))], 3);
        let targets: Vec<Target> = (1..=6).map(node).collect();
        let labels: Vec<String> = targets.iter().map(|t| t.label.clone()).collect();

        let measured = probe.probe_all(targets).await;
        let measured_labels: Vec<String> = measured.iter().map(|t| t.label.clone()).collect();
        assert_eq!(measured_labels, labels);
    }
}
