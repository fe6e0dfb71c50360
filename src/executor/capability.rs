//! Which ICMP probe strategies this host supports

use super::icmp;
use super::strategy::{CommandStrategy, IcmpStrategy, ProbeStrategy};
use crate::{error::Result, logging::Logger};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Probe capabilities detected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// An ICMP socket (raw or datagram) can be opened
    pub icmp_socket: bool,
    /// A working `ping` binary is on the PATH
    pub ping_command: bool,
}

impl Capabilities {
    pub async fn detect() -> Self {
        let icmp_socket = tokio::task::spawn_blocking(icmp::socket_available)
            .await
            .unwrap_or(false);
        Self { icmp_socket, ping_command: ping_command_available("ping").await }
    }

    /// Strategies in preference order: in-process ICMP, then the ping binary
    pub async fn strategies(&self, timeout: Duration, logger: &Logger) -> Result<Vec<Arc<dyn ProbeStrategy>>> {
        let mut strategies: Vec<Arc<dyn ProbeStrategy>> = Vec::new();
        if self.icmp_socket {
            strategies.push(Arc::new(IcmpStrategy::new(timeout)));
        }
        if self.ping_command {
            strategies.push(Arc::new(CommandStrategy::new(timeout)?));
        }

        if strategies.is_empty() {
            logger
                .warn("no ICMP probe method available; every IP target will be unreachable")
                .log()
                .await;
        } else {
            logger
                .debug("probe strategies selected")
                .field("icmp_socket", self.icmp_socket)
                .field("ping_command", self.ping_command)
                .log()
                .await;
        }
        Ok(strategies)
    }
}

/// Whether `program` runs and prints ping's usage text
async fn ping_command_available(program: &str) -> bool {
    match Command::new(program).arg("-h").kill_on_drop(true).output().await {
        Ok(output) => {
            let text = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            text.to_lowercase().contains("usage")
        }
        Err(_) => false,
    }
}
