//! Hostname resolution for source rows that carry a domain instead of an IP

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};
use tokio::time::timeout;
use trust_dns_resolver::{
    config::{ResolverConfig, ResolverOpts},
    system_conf, TokioAsyncResolver,
};

/// Resolves a hostname to the single IPv4 address a target is probed at
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve_v4(&self, host: &str) -> Result<Ipv4Addr>;
}

/// Resolver backed by the system configuration
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl SystemResolver {
    /// Build from the system configuration, falling back to public defaults
    /// when it cannot be read
    pub fn new(resolve_timeout: Duration) -> Self {
        let (config, mut opts) = system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        opts.timeout = resolve_timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout: resolve_timeout,
        }
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve_v4(&self, host: &str) -> Result<Ipv4Addr> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        let lookup = timeout(self.timeout, self.resolver.lookup_ip(host))
            .await
            .map_err(|_| AppError::timeout(format!("resolving {} took longer than {}ms", host, self.timeout.as_millis())))??;

        lookup
            .iter()
            .find_map(|ip| match ip {
                IpAddr::V4(v4) => Some(v4),
                IpAddr::V6(_) => None,
            })
            .ok_or_else(|| AppError::dns_resolution(format!("{} has no IPv4 address", host)))
    }
}

/// Fixed host table; anything not listed fails to resolve
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Ipv4Addr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, ip: Ipv4Addr) -> Self {
        self.hosts.insert(host.to_string(), ip);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve_v4(&self, host: &str) -> Result<Ipv4Addr> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        self.hosts
            .get(host)
            .copied()
            .ok_or_else(|| AppError::dns_resolution(format!("{} not found", host)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literal_skips_lookup() {
        let resolver = SystemResolver::new(Duration::from_millis(100));
        let ip = resolver.resolve_v4("203.0.113.7").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[tokio::test]
    async fn test_unresolvable_host_fails() {
        let resolver = SystemResolver::new(Duration::from_millis(500));
        assert!(resolver.resolve_v4("does-not-exist.invalid").await.is_err());
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticResolver::new().with_host("speed.example.cn", Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(resolver.resolve_v4("speed.example.cn").await.unwrap(), Ipv4Addr::new(10, 1, 2, 3));
        assert_eq!(resolver.resolve_v4("10.9.9.9").await.unwrap(), Ipv4Addr::new(10, 9, 9, 9));
        let err = resolver.resolve_v4("other.example.cn").await.unwrap_err();
        assert_eq!(err.category(), "DNS");
    }
}
