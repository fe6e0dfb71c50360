//! Target acquisition for the ISP report
//!
//! For one carrier, the node list (through [`TargetCache`]) and both
//! columnar exports are fetched and parsed concurrently. Results fan in over
//! an mpsc channel and are merged on the calling task once every source has
//! reported or the umbrella deadline passes.

pub mod cache;
pub mod merge;
pub mod parser;

pub use cache::TargetCache;
pub use merge::merge;
pub use crate::models::normalize_region;
pub use parser::{RecordParser, SchemaVariant};

use crate::{
    client::PayloadSource,
    dns::HostResolver,
    logging::Logger,
    models::{Config, SourceEndpoints, Target},
    types::Carrier,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{sleep, timeout},
};

/// Gathers and merges the target list for each carrier
pub struct SourceGatherer {
    source: Arc<dyn PayloadSource>,
    parser: Arc<RecordParser>,
    cache: Arc<TargetCache>,
    endpoints: SourceEndpoints,
    deadline: Duration,
    grace: Duration,
    logger: Logger,
}

impl SourceGatherer {
    pub fn new(
        source: Arc<dyn PayloadSource>,
        resolver: Arc<dyn HostResolver>,
        endpoints: SourceEndpoints,
        logger: &Logger,
    ) -> Self {
        let cache = Arc::new(TargetCache::new(source.clone(), &endpoints.node_list, logger));
        Self {
            source,
            parser: Arc::new(RecordParser::new(resolver, logger)),
            cache,
            endpoints,
            deadline: crate::defaults::DEFAULT_GATHER_DEADLINE,
            grace: crate::defaults::DEFAULT_GRACE_PERIOD,
            logger: logger.child("sources"),
        }
    }

    pub fn from_config(
        config: &Config,
        source: Arc<dyn PayloadSource>,
        resolver: Arc<dyn HostResolver>,
        logger: &Logger,
    ) -> Self {
        Self::new(source, resolver, config.endpoints.clone(), logger)
            .with_deadlines(config.gather_deadline(), config.grace_period())
    }

    /// Umbrella deadline for one carrier and the grace period after it
    pub fn with_deadlines(mut self, deadline: Duration, grace: Duration) -> Self {
        self.deadline = deadline;
        self.grace = grace;
        self
    }

    /// Shared node-list cache
    pub fn cache(&self) -> &Arc<TargetCache> {
        &self.cache
    }

    /// Merged, deduplicated targets for `carrier`
    ///
    /// Never fails: unavailable sources contribute nothing, and sources still
    /// running at the deadline are abandoned.
    pub async fn gather(&self, carrier: Carrier) -> Vec<Target> {
        let (tx, mut rx) = mpsc::channel::<(SchemaVariant, Vec<Target>)>(4);
        let mut tasks = JoinSet::new();

        {
            let cache = self.cache.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let targets = cache.targets_for(carrier).await;
                let _ = tx.send((SchemaVariant::NodeList, targets)).await;
            });
        }

        let exports = [
            (SchemaVariant::NetExport, self.endpoints.net_export.get(carrier).to_string()),
            (SchemaVariant::CnExport, self.endpoints.cn_export.get(carrier).to_string()),
        ];
        for (variant, endpoint) in exports {
            let source = self.source.clone();
            let parser = self.parser.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let payload = source.fetch(&endpoint).await;
                let targets = parser.parse(&payload, variant, carrier).await;
                let _ = tx.send((variant, targets)).await;
            });
        }
        drop(tx);

        let mut collected = Vec::new();
        let deadline = sleep(self.deadline);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some((variant, targets)) => {
                        self.logger.debug("source reported")
                            .field("carrier", carrier.short_name())
                            .field("source", variant.as_str())
                            .field("targets", targets.len())
                            .log().await;
                        collected.extend(targets);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    self.logger.warn("source gathering timed out, using partial results")
                        .field("carrier", carrier.short_name())
                        .field("collected", collected.len())
                        .log().await;
                    break;
                }
            }
        }

        self.drain(&mut tasks, carrier).await;

        let merged = merge(collected);
        self.logger.info("targets gathered")
            .field("carrier", carrier.short_name())
            .field("targets", merged.len())
            .log().await;
        merged
    }

    /// Give source tasks the grace period to finish, then abort the rest
    async fn drain(&self, tasks: &mut JoinSet<()>, carrier: Carrier) {
        let logger = &self.logger;
        let finished = timeout(self.grace, async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        logger.warn("source task panicked")
                            .field("carrier", carrier.short_name())
                            .field("error", e.to_string())
                            .log().await;
                    }
                }
            }
        })
        .await;

        if finished.is_err() {
            self.logger.warn("aborting straggling source tasks")
                .field("carrier", carrier.short_name())
                .field("remaining", tasks.len())
                .log().await;
            tasks.abort_all();
        }
    }
}
