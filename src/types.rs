//! Type definitions and aliases

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Domestic carriers covered by the ISP latency report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Carrier {
    /// China Unicom
    Unicom,
    /// China Telecom
    Telecom,
    /// China Mobile
    Mobile,
}

impl Carrier {
    /// Report order: Unicom, Telecom, Mobile
    pub const ALL: [Carrier; 3] = [Carrier::Unicom, Carrier::Telecom, Carrier::Mobile];

    /// Display prefix used in target labels
    pub fn prefix(&self) -> &'static str {
        match self {
            Carrier::Mobile => "移动",
            Carrier::Telecom => "电信",
            Carrier::Unicom => "联通",
        }
    }

    /// Carrier code used by the node-list JSON
    pub fn node_code(&self) -> &'static str {
        match self {
            Carrier::Mobile => "cm",
            Carrier::Telecom => "ct",
            Carrier::Unicom => "cu",
        }
    }

    /// Short operator name used in logs and on the command line
    pub fn short_name(&self) -> &'static str {
        match self {
            Carrier::Mobile => "cmcc",
            Carrier::Telecom => "ct",
            Carrier::Unicom => "cu",
        }
    }

    /// Look up a carrier from its node-list code
    pub fn from_node_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.node_code() == code)
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Data source a target came from, ordered by merge priority
///
/// The derived ordering is the priority order: `Dedicated` beats `Regional`,
/// which beats `Generic`. `Builtin` ranks below all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourcePriority {
    /// Built-in catalog (relay nodes, websites); never merged
    Builtin,
    /// Generic speedtest.cn export
    Generic,
    /// Regional speedtest.net export
    Regional,
    /// Dedicated ICMP node list
    Dedicated,
}

impl SourcePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePriority::Generic => "generic",
            SourcePriority::Regional => "regional",
            SourcePriority::Dedicated => "dedicated",
            SourcePriority::Builtin => "builtin",
        }
    }
}

/// What a probe is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    /// IPv4 host measured with ICMP echo
    Ip(Ipv4Addr),
    /// Web endpoint measured with HTTP GET
    Url(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ip(ip) => write!(f, "{}", ip),
            Endpoint::Url(url) => f.write_str(url),
        }
    }
}

/// Which report to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReportMode {
    /// Domestic three-carrier ISP latency
    #[default]
    Isp,
    /// Telegram relay data centers
    Relay,
    /// Popular website connectivity
    Web,
    /// All of the above, in order
    Global,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMode::Isp => "isp",
            ReportMode::Relay => "relay",
            ReportMode::Web => "web",
            ReportMode::Global => "global",
        }
    }
}

impl FromStr for ReportMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "isp" | "" => Ok(ReportMode::Isp),
            "relay" | "tgdc" => Ok(ReportMode::Relay),
            "web" => Ok(ReportMode::Web),
            "global" => Ok(ReportMode::Global),
            other => Err(AppError::parse(format!("Unknown report mode: {}", other))),
        }
    }
}

/// What to do with targets that never answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum UnreachablePolicy {
    /// Keep them in the report with a sentinel value, sorted last
    #[default]
    Show,
    /// Leave them out of the report entirely
    Drop,
}

impl FromStr for UnreachablePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "show" => Ok(UnreachablePolicy::Show),
            "drop" => Ok(UnreachablePolicy::Drop),
            other => Err(AppError::parse(format!("Unknown unreachable policy: {}", other))),
        }
    }
}
