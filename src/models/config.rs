//! Configuration data model and validation

use crate::types::{AppError, Carrier, ReportMode, Result, UnreachablePolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One URL per carrier for a columnar export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierUrls {
    pub mobile: String,
    pub telecom: String,
    pub unicom: String,
}

impl CarrierUrls {
    pub fn get(&self, carrier: Carrier) -> &str {
        match carrier {
            Carrier::Mobile => &self.mobile,
            Carrier::Telecom => &self.telecom,
            Carrier::Unicom => &self.unicom,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &String> {
        [&self.mobile, &self.telecom, &self.unicom].into_iter()
    }
}

/// Remote sources behind the ISP report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEndpoints {
    /// Dedicated ICMP node list (JSON)
    pub node_list: String,
    /// speedtest.net exports
    pub net_export: CarrierUrls,
    /// speedtest.cn exports
    pub cn_export: CarrierUrls,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        use crate::defaults::*;
        Self {
            node_list: NODE_LIST_URL.to_string(),
            net_export: CarrierUrls {
                mobile: NET_EXPORT_MOBILE.to_string(),
                telecom: NET_EXPORT_TELECOM.to_string(),
                unicom: NET_EXPORT_UNICOM.to_string(),
            },
            cn_export: CarrierUrls {
                mobile: CN_EXPORT_MOBILE.to_string(),
                telecom: CN_EXPORT_TELECOM.to_string(),
                unicom: CN_EXPORT_UNICOM.to_string(),
            },
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which report to produce
    #[serde(default)]
    pub mode: ReportMode,

    /// Ordered mirror prefixes prepended to every endpoint
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,

    /// Path fetched through a mirror to check that it is alive
    #[serde(default = "default_liveness_path")]
    pub liveness_path: String,

    /// Substring the liveness response must contain
    #[serde(default = "default_liveness_marker")]
    pub liveness_marker: String,

    /// Remote data sources
    #[serde(default)]
    pub endpoints: SourceEndpoints,

    /// Per-request timeout for source fetches
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Retries per mirror after the first request
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Wall-clock budget for one fetch across all mirrors
    #[serde(default = "default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,

    /// Umbrella deadline for gathering one carrier's sources
    #[serde(default = "default_gather_deadline_secs")]
    pub gather_deadline_secs: u64,

    /// Time in-flight source tasks get to exit after the deadline
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Timeout for resolving a hostname from a source row
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,

    /// Probe attempts per target
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Timeout for a single probe attempt
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Maximum probes in flight per carrier group
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Maximum website requests in flight
    #[serde(default = "default_web_concurrency")]
    pub web_concurrency: usize,

    /// Timeout for one website request
    #[serde(default = "default_web_timeout_secs")]
    pub web_timeout_secs: u64,

    /// Whether unreachable targets stay in the report
    #[serde(default)]
    pub unreachable: UnreachablePolicy,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ReportMode::default(),
            mirrors: default_mirrors(),
            liveness_path: default_liveness_path(),
            liveness_marker: default_liveness_marker(),
            endpoints: SourceEndpoints::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            fetch_retries: default_fetch_retries(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            fetch_deadline_secs: default_fetch_deadline_secs(),
            gather_deadline_secs: default_gather_deadline_secs(),
            grace_period_secs: default_grace_period_secs(),
            resolve_timeout_ms: default_resolve_timeout_ms(),
            probe_attempts: default_probe_attempts(),
            probe_timeout_ms: default_probe_timeout_ms(),
            concurrency: default_concurrency(),
            web_concurrency: default_web_concurrency(),
            web_timeout_secs: default_web_timeout_secs(),
            unreachable: UnreachablePolicy::default(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }

    pub fn backoff_bounds(&self) -> (Duration, Duration) {
        (Duration::from_millis(self.backoff_min_ms), Duration::from_millis(self.backoff_max_ms))
    }

    pub fn gather_deadline(&self) -> Duration {
        Duration::from_secs(self.gather_deadline_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn web_timeout(&self) -> Duration {
        Duration::from_secs(self.web_timeout_secs)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.mirrors.is_empty() {
            return Err(AppError::config("At least one mirror is required"));
        }

        for mirror in &self.mirrors {
            match url::Url::parse(mirror) {
                Ok(parsed) => {
                    if parsed.scheme() != "http" && parsed.scheme() != "https" {
                        return Err(AppError::config(format!("Mirror must use HTTP or HTTPS: {}", mirror)));
                    }
                    if !mirror.ends_with('/') {
                        return Err(AppError::config(format!("Mirror must end with '/': {}", mirror)));
                    }
                }
                Err(e) => {
                    return Err(AppError::config(format!("Invalid mirror URL '{}': {}", mirror, e)));
                }
            }
        }

        if self.liveness_marker.is_empty() {
            return Err(AppError::config("Liveness marker cannot be empty"));
        }

        let endpoints = std::iter::once(&self.endpoints.node_list)
            .chain(self.endpoints.net_export.iter())
            .chain(self.endpoints.cn_export.iter());
        for endpoint in endpoints {
            if endpoint.trim().is_empty() {
                return Err(AppError::config("Source endpoint cannot be empty"));
            }
        }

        if self.concurrency == 0 || self.concurrency > 1000 {
            return Err(AppError::config("Concurrency must be between 1 and 1000"));
        }

        if self.web_concurrency == 0 || self.web_concurrency > 1000 {
            return Err(AppError::config("Website concurrency must be between 1 and 1000"));
        }

        if self.probe_attempts == 0 || self.probe_attempts > 10 {
            return Err(AppError::config("Probe attempts must be between 1 and 10"));
        }

        let timeouts = [
            ("Fetch timeout", self.fetch_timeout_ms),
            ("Fetch deadline", self.fetch_deadline_secs),
            ("Gather deadline", self.gather_deadline_secs),
            ("Resolve timeout", self.resolve_timeout_ms),
            ("Probe timeout", self.probe_timeout_ms),
            ("Website timeout", self.web_timeout_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(AppError::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.backoff_min_ms > self.backoff_max_ms {
            return Err(AppError::config("Minimum backoff cannot exceed maximum backoff"));
        }

        Ok(())
    }
}

// Default value functions for serde
fn default_mirrors() -> Vec<String> {
    crate::defaults::DEFAULT_MIRRORS
        .iter()
        .map(|&s| s.to_string())
        .collect()
}

fn default_liveness_path() -> String {
    crate::defaults::LIVENESS_PATH.to_string()
}

fn default_liveness_marker() -> String {
    crate::defaults::LIVENESS_MARKER.to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_FETCH_TIMEOUT.as_millis() as u64
}

fn default_fetch_retries() -> u32 {
    crate::defaults::DEFAULT_FETCH_RETRIES
}

fn default_backoff_min_ms() -> u64 {
    crate::defaults::DEFAULT_BACKOFF_MIN.as_millis() as u64
}

fn default_backoff_max_ms() -> u64 {
    crate::defaults::DEFAULT_BACKOFF_MAX.as_millis() as u64
}

fn default_fetch_deadline_secs() -> u64 {
    crate::defaults::DEFAULT_FETCH_DEADLINE.as_secs()
}

fn default_gather_deadline_secs() -> u64 {
    crate::defaults::DEFAULT_GATHER_DEADLINE.as_secs()
}

fn default_grace_period_secs() -> u64 {
    crate::defaults::DEFAULT_GRACE_PERIOD.as_secs()
}

fn default_resolve_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_RESOLVE_TIMEOUT.as_millis() as u64
}

fn default_probe_attempts() -> u32 {
    crate::defaults::DEFAULT_PROBE_ATTEMPTS
}

fn default_probe_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_PROBE_TIMEOUT.as_millis() as u64
}

fn default_concurrency() -> usize {
    crate::defaults::DEFAULT_CONCURRENCY
}

fn default_web_concurrency() -> usize {
    crate::defaults::DEFAULT_WEB_CONCURRENCY
}

fn default_web_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_WEB_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fetch_timeout(), Duration::from_secs(6));
        assert_eq!(config.concurrency, 100);
        assert_eq!(config.probe_attempts, 3);
    }

    #[test]
    fn test_mirror_without_trailing_slash_invalid() {
        let mut config = Config::default();
        config.mirrors = vec!["http://cdn.example.com".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_http_mirror_invalid() {
        let mut config = Config::default();
        config.mirrors = vec!["ftp://cdn.example.com/".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_mirror_list_invalid() {
        let mut config = Config::default();
        config.mirrors.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        let mut config = Config::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = 1001;
        assert!(config.validate().is_err());
        config.concurrency = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_attempt_bounds() {
        let mut config = Config::default();
        config.probe_attempts = 0;
        assert!(config.validate().is_err());
        config.probe_attempts = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.probe_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Probe timeout"));
    }

    #[test]
    fn test_carrier_urls_lookup() {
        let endpoints = SourceEndpoints::default();
        assert!(endpoints.net_export.get(Carrier::Mobile).ends_with("CN_Mobile.csv"));
        assert!(endpoints.cn_export.get(Carrier::Unicom).ends_with("unicom.csv"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"concurrency": 20, "unreachable": "Drop"}"#).unwrap();
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.unreachable, UnreachablePolicy::Drop);
        assert_eq!(config.mirrors.len(), 4);
    }
}
