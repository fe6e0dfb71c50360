//! Command-line interface

use crate::types::{ReportMode, UnreachablePolicy};
use clap::Parser;

const EXAMPLES: &str = "\
Examples:
  pingtest                 # domestic carrier latency (default)
  pingtest -m relay        # Telegram data centers
  pingtest -m web          # popular websites
  pingtest -m global       # all of the above
  pingtest --log           # log progress to stderr";

/// Multi-source latency probe for carrier, relay and website reachability
#[derive(Parser, Debug, Clone)]
#[command(name = "pingtest")]
#[command(about, long_about = None, after_help = EXAMPLES)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Report to run
    #[arg(short, long, value_enum, default_value_t = ReportMode::Isp)]
    pub mode: ReportMode,

    /// Log progress to stderr
    #[arg(long)]
    pub log: bool,

    /// Debug logging (JSON) and configuration dump
    #[arg(long)]
    pub debug: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Maximum concurrent probes per carrier group
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Probe attempts per target
    #[arg(long, value_name = "N")]
    pub attempts: Option<u32>,

    /// Per-attempt probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// What to do with targets that never answered
    #[arg(long, value_enum)]
    pub unreachable: Option<UnreachablePolicy>,

    /// Print version information
    #[arg(short = 'v', long)]
    pub version: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and ranges
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > 1000 {
                return Err(format!("--concurrency must be between 1 and 1000, got {}", concurrency));
            }
        }

        if let Some(attempts) = self.attempts {
            if attempts == 0 || attempts > 10 {
                return Err(format!("--attempts must be between 1 and 10, got {}", attempts));
            }
        }

        if self.probe_timeout == Some(0) {
            return Err("--probe-timeout must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            crate::output::ConsoleStyle::supports_color()
        }
    }

    /// Explicit color choice, if any
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }
}
