//! HTTP clients: mirrored source fetching and the website probe client


use crate::{
    error::{run_attempts, AppError, Result, RetryPolicy},
    logging::Logger,
    models::Config,
};
use async_trait::async_trait;
use reqwest::Client;
use std::{sync::Arc, time::{Duration, Instant}};
use tokio::time::{sleep, timeout};

pub const USER_AGENT: &str = concat!("pingtest/", env!("CARGO_PKG_VERSION"));

/// Bodies containing any of these are mirror error pages, not payloads
const ERROR_MARKERS: &[&str] = &["404: Not Found", "error code:", "<title>Error", "Bad Gateway"];

/// Anything that can produce the raw payload behind a logical endpoint
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Payload for `endpoint`, or an empty string when the source is unavailable
    async fn fetch(&self, endpoint: &str) -> String;
}

/// Fetches payloads through an ordered list of mirror prefixes
pub struct MirrorFetcher {
    client: Client,
    mirrors: Vec<String>,
    liveness_path: String,
    liveness_marker: String,
    retry: RetryPolicy,
    deadline: Duration,
    skip_pause: Duration,
    logger: Arc<Logger>,
}

impl MirrorFetcher {
    pub fn new(config: &Config, logger: Arc<Logger>) -> Result<Self> {
        let client = ClientFactory::fetch_client(config.fetch_timeout())?;
        let (min_backoff, max_backoff) = config.backoff_bounds();

        Ok(Self {
            client,
            mirrors: config.mirrors.clone(),
            liveness_path: config.liveness_path.clone(),
            liveness_marker: config.liveness_marker.clone(),
            retry: RetryPolicy::with_backoff(
                config.fetch_retries as usize,
                config.fetch_timeout(),
                min_backoff,
                max_backoff,
            ),
            deadline: config.fetch_deadline(),
            skip_pause: crate::defaults::MIRROR_SKIP_PAUSE,
            logger: Arc::new(logger.child("fetch")),
        })
    }

    /// Override the overall per-call deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Override the pause after a mirror fails its liveness check
    pub fn with_skip_pause(mut self, pause: Duration) -> Self {
        self.skip_pause = pause;
        self
    }

    /// Ask the mirror for the liveness document and look for the marker
    async fn mirror_is_live(&self, mirror: &str) -> bool {
        let url = format!("{}{}", mirror, self.liveness_path);
        let result = async {
            let response = self.client.get(&url).send().await?;
            let body = response.text().await?;
            Ok::<_, AppError>(body.contains(&self.liveness_marker))
        }
        .await;

        match result {
            Ok(true) => true,
            Ok(false) => {
                self.logger.info("mirror liveness response lacks marker").field("mirror", mirror).log().await;
                false
            }
            Err(e) => {
                self.logger.info("mirror liveness check failed").field("mirror", mirror).error_info(&e).log().await;
                false
            }
        }
    }

    /// One GET; non-2xx statuses, empty bodies and error pages are failures
    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http_request(format!("{} returned {}", url, status)));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(AppError::http_request(format!("{} returned an empty body", url)));
        }
        if let Some(marker) = ERROR_MARKERS.iter().find(|m| body.contains(*m)) {
            return Err(AppError::http_request(format!("{} returned an error page ({})", url, marker)));
        }
        Ok(body)
    }

    async fn fetch_through_mirrors(&self, endpoint: &str, started: Instant) -> Option<String> {
        for mirror in &self.mirrors {
            if !self.mirror_is_live(mirror).await {
                self.logger.info("skipping mirror").field("mirror", mirror).log().await;
                sleep(self.skip_pause).await;
                continue;
            }

            let url = format!("{}{}", mirror, endpoint);
            let policy = self.retry.clone().deadline(self.deadline.saturating_sub(started.elapsed()));
            match run_attempts(&policy, |_| self.fetch_once(&url)).await {
                Ok(body) => {
                    self.logger.info("fetched payload")
                        .field("url", &url)
                        .field("bytes", body.len())
                        .log().await;
                    return Some(body);
                }
                Err(e) => {
                    self.logger.info("mirror fetch failed")
                        .field("url", &url)
                        .field("attempts", e.attempts)
                        .error_info(&e.last_error)
                        .log().await;
                }
            }
        }
        None
    }
}

#[async_trait]
impl PayloadSource for MirrorFetcher {
    async fn fetch(&self, endpoint: &str) -> String {
        let started = Instant::now();
        match timeout(self.deadline, self.fetch_through_mirrors(endpoint, started)).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                self.logger.warn("all mirrors failed").field("endpoint", endpoint).log().await;
                String::new()
            }
            Err(_) => {
                self.logger.warn("fetch deadline reached")
                    .field("endpoint", endpoint)
                    .field("deadline_ms", self.deadline.as_millis() as u64)
                    .log().await;
                String::new()
            }
        }
    }
}

/// Builds the reqwest clients used across the tool
pub struct ClientFactory;

impl ClientFactory {
    /// Client for source payloads
    pub fn fetch_client(request_timeout: Duration) -> Result<Client> {
        Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }

    /// Client for website probes; follows a bounded number of redirects
    pub fn web_client(request_timeout: Duration, max_redirects: usize) -> Result<Client> {
        Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))
    }
}
