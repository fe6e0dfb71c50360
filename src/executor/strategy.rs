//! Single-attempt probe strategies
//!
//! A strategy measures one round trip. Repetition, averaging and fallback
//! between strategies belong to [`super::ProbeEngine`].

use super::icmp;
use crate::{
    error::{AppError, Result},
    models::Target,
    types::Endpoint,
};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// One way of measuring a round trip
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Measure a single round trip to `target`
    async fn attempt(&self, target: &Target, attempt: usize) -> Result<Duration>;
}

fn ip_of(target: &Target) -> Result<std::net::Ipv4Addr> {
    target
        .address()
        .ok_or_else(|| AppError::validation(format!("{} has no IPv4 address", target.label)))
}

/// ICMP echo through a socket opened by this process
pub struct IcmpStrategy {
    timeout: Duration,
}

impl IcmpStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProbeStrategy for IcmpStrategy {
    fn name(&self) -> &'static str {
        "icmp"
    }

    async fn attempt(&self, target: &Target, _attempt: usize) -> Result<Duration> {
        let ip = ip_of(target)?;
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || icmp::echo_once(ip, timeout)).await?
    }
}

/// The system `ping` binary, one echo per attempt
pub struct CommandStrategy {
    program: String,
    wait_secs: u64,
    rtt_pattern: Regex,
}

impl CommandStrategy {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            program: "ping".to_string(),
            wait_secs: timeout.as_secs().max(1),
            rtt_pattern: Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms")
                .map_err(|e| AppError::internal(format!("bad RTT pattern: {}", e)))?,
        })
    }

    /// Use another binary with ping-compatible flags
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    /// Round-trip time reported in `ping` output
    pub fn parse_rtt(&self, output: &str) -> Option<Duration> {
        let captures = self.rtt_pattern.captures(output)?;
        let millis: f64 = captures.get(1)?.as_str().parse().ok()?;
        if millis.is_finite() && millis >= 0.0 {
            Some(Duration::from_secs_f64(millis / 1000.0))
        } else {
            None
        }
    }
}

#[async_trait]
impl ProbeStrategy for CommandStrategy {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn attempt(&self, target: &Target, _attempt: usize) -> Result<Duration> {
        let ip = ip_of(target)?;
        let output = Command::new(&self.program)
            .arg("-c1")
            .arg(format!("-W{}", self.wait_secs))
            .arg(ip.to_string())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_rtt(&stdout).ok_or_else(|| {
            AppError::probe(format!("{} {} printed no round-trip time (exit {})", self.program, ip, output.status))
        })
    }
}

/// HTTP GET; any status below 500 counts as a round trip
pub struct HttpStrategy {
    client: Client,
}

impl HttpStrategy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProbeStrategy for HttpStrategy {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn attempt(&self, target: &Target, _attempt: usize) -> Result<Duration> {
        let url = match &target.endpoint {
            Endpoint::Url(url) => url,
            Endpoint::Ip(_) => {
                return Err(AppError::validation(format!("{} has no URL", target.label)));
            }
        };

        let started = Instant::now();
        let response = self.client.get(url).send().await?;
        let elapsed = started.elapsed();

        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::http_request(format!("{} returned {}", url, status)));
        }
        Ok(elapsed)
    }
}
