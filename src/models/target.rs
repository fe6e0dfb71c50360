//! Probe targets and per-attempt outcomes

use crate::stats::LatencySamples;
use crate::types::{Carrier, Endpoint, SourcePriority};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Administrative suffixes removed from region names, longest first
const REGION_SUFFIXES: &[&str] = &["维吾尔自治区", "回族自治区", "壮族自治区", "自治区", "特别行政区", "省", "市"];

/// Strip a carrier prefix and administrative suffix from a region name
pub fn normalize_region(raw: &str) -> String {
    let mut region = raw.trim();

    if let Some(rest) = Carrier::ALL.iter().find_map(|c| region.strip_prefix(c.prefix())) {
        region = rest;
    }
    if let Some(rest) = Carrier::ALL.iter().find_map(|c| region.strip_suffix(c.prefix())) {
        region = rest;
    }
    if let Some(rest) = REGION_SUFFIXES.iter().find_map(|s| region.strip_suffix(s)) {
        if !rest.trim().is_empty() {
            region = rest;
        }
    }

    region.trim().to_string()
}

/// Result of a single probe attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Round trip completed
    Success(Duration),
    /// Attempt failed for the given reason
    Failure(String),
}

/// Something to measure, plus its measurement once probed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Display name as the source wrote it, or a fixed catalog name
    pub label: String,
    /// Where probes are sent
    pub endpoint: Endpoint,
    /// Carrier for ISP targets
    pub carrier: Option<Carrier>,
    /// Normalized region (empty for catalog targets)
    pub region: String,
    /// Website category
    pub category: Option<String>,
    /// Source that produced this target; used only when merging
    pub source_priority: SourcePriority,
    /// Mean of successful attempts, zero until probed successfully
    pub measured_latency: Duration,
    /// Set once at least one attempt succeeded
    pub tested: bool,
}

impl Target {
    /// ISP vantage point named by its source
    ///
    /// The label keeps `name` verbatim, with the carrier prefix added in front
    /// when the name does not already mention the carrier. Only the merge
    /// key uses the normalized region.
    pub fn carrier_node(carrier: Carrier, name: &str, address: Ipv4Addr, source_priority: SourcePriority) -> Self {
        let name = name.trim();
        let label = if name.contains(carrier.prefix()) {
            name.to_string()
        } else {
            format!("{}{}", carrier.prefix(), name)
        };
        Self {
            label,
            endpoint: Endpoint::Ip(address),
            carrier: Some(carrier),
            region: normalize_region(name),
            category: None,
            source_priority,
            measured_latency: Duration::ZERO,
            tested: false,
        }
    }

    /// Fixed relay node probed over ICMP
    pub fn relay(label: &str, address: Ipv4Addr) -> Self {
        Self {
            label: label.to_string(),
            endpoint: Endpoint::Ip(address),
            carrier: None,
            region: String::new(),
            category: None,
            source_priority: SourcePriority::Builtin,
            measured_latency: Duration::ZERO,
            tested: false,
        }
    }

    /// Website probed over HTTP
    pub fn website(name: &str, url: &str, category: &str) -> Self {
        Self {
            label: name.to_string(),
            endpoint: Endpoint::Url(url.to_string()),
            carrier: None,
            region: String::new(),
            category: Some(category.to_string()),
            source_priority: SourcePriority::Builtin,
            measured_latency: Duration::ZERO,
            tested: false,
        }
    }

    /// Merge key; catalog targets have none
    pub fn merge_key(&self) -> Option<(Carrier, &str)> {
        self.carrier.map(|c| (c, self.region.as_str()))
    }

    /// IPv4 address, if this target is probed over ICMP
    pub fn address(&self) -> Option<Ipv4Addr> {
        match &self.endpoint {
            Endpoint::Ip(ip) => Some(*ip),
            Endpoint::Url(_) => None,
        }
    }

    /// Record the outcome of all attempts
    ///
    /// Only successful attempts contribute to the mean. With no successes the
    /// target stays untested with zero latency.
    pub fn record(&mut self, samples: &LatencySamples) {
        match samples.mean() {
            Some(mean) => {
                self.measured_latency = mean.max(Duration::from_micros(1));
                self.tested = true;
            }
            None => self.mark_unreachable(),
        }
    }

    pub fn mark_unreachable(&mut self) {
        self.measured_latency = Duration::ZERO;
        self.tested = false;
    }

    pub fn is_reachable(&self) -> bool {
        self.tested && !self.measured_latency.is_zero()
    }
}
