//! pingtest
//!
//! Measures round-trip latency from this host to regional ISP vantage
//! points, Telegram relay data centers and popular websites, and prints a
//! ranked fixed-width report.
//!
//! Target lists for the ISP report are gathered from several unreliable
//! mirrored sources, merged per (carrier, region), and probed under a bounded
//! worker pool with an ICMP / `ping` fallback chain.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod sources;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, ProbeOutcome, Target};
pub use types::{Carrier, Endpoint, ReportMode, SourcePriority, UnreachablePolicy};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const PROJECT_URL: &str = "https://github.com/oneclickvirt/pingtest";
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_MIRRORS: &[&str] = &[
        "http://cdn1.spiritlhl.net/",
        "http://cdn2.spiritlhl.net/",
        "http://cdn3.spiritlhl.net/",
        "http://cdn4.spiritlhl.net/",
    ];
    /// Fetched through each mirror before it is used
    pub const LIVENESS_PATH: &str = "https://raw.githubusercontent.com/spiritLHLS/ecs/main/back/test";
    pub const LIVENESS_MARKER: &str = "success";

    pub const NODE_LIST_URL: &str = "https://raw.githubusercontent.com/spiritLHLS/icmp_targets/refs/heads/main/nodes.json";
    pub const NET_EXPORT_MOBILE: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.net-CN-ID/main/CN_Mobile.csv";
    pub const NET_EXPORT_TELECOM: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.net-CN-ID/main/CN_Telecom.csv";
    pub const NET_EXPORT_UNICOM: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.net-CN-ID/main/CN_Unicom.csv";
    pub const CN_EXPORT_MOBILE: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.cn-CN-ID/main/mobile.csv";
    pub const CN_EXPORT_TELECOM: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.cn-CN-ID/main/telecom.csv";
    pub const CN_EXPORT_UNICOM: &str = "https://raw.githubusercontent.com/spiritLHLS/speedtest.cn-CN-ID/main/unicom.csv";

    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(6);
    pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(30);
    pub const DEFAULT_FETCH_RETRIES: u32 = 2;
    pub const DEFAULT_BACKOFF_MIN: Duration = Duration::from_secs(1);
    pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(3);
    /// Pause after a mirror fails its liveness check
    pub const MIRROR_SKIP_PAUSE: Duration = Duration::from_millis(500);

    pub const DEFAULT_GATHER_DEADLINE: Duration = Duration::from_secs(60);
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
    pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

    pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_CONCURRENCY: usize = 100;

    pub const DEFAULT_WEB_CONCURRENCY: usize = 10;
    pub const DEFAULT_WEB_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_REDIRECTS: usize = 10;

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
