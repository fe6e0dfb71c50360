//! Process-lifetime cache of the dedicated node list

use super::parser::{node_targets, parse_node_list, NodeEntry, ParseReport};
use crate::{client::PayloadSource, logging::Logger, models::Target, types::Carrier};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};
use tokio::sync::Mutex;

/// Node list fetched and parsed at most once, shared by every carrier group
///
/// Readers take the lock-free path once the list is loaded. Until then,
/// loaders serialize on `load_gate` and re-check before fetching. A fetch
/// that produces no usable entries is not cached, so a later caller tries
/// again.
pub struct TargetCache {
    source: Arc<dyn PayloadSource>,
    endpoint: String,
    entries: OnceLock<Arc<Vec<NodeEntry>>>,
    load_gate: Mutex<()>,
    fetches: AtomicUsize,
    logger: Logger,
}

impl TargetCache {
    pub fn new(source: Arc<dyn PayloadSource>, endpoint: &str, logger: &Logger) -> Self {
        Self {
            source,
            endpoint: endpoint.to_string(),
            entries: OnceLock::new(),
            load_gate: Mutex::new(()),
            fetches: AtomicUsize::new(0),
            logger: logger.child("cache"),
        }
    }

    /// Load the node list if nobody has yet, then return it
    pub async fn ensure_loaded(&self) -> Arc<Vec<NodeEntry>> {
        if let Some(entries) = self.entries.get() {
            return entries.clone();
        }

        let _gate = self.load_gate.lock().await;
        if let Some(entries) = self.entries.get() {
            return entries.clone();
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        let payload = self.source.fetch(&self.endpoint).await;
        if payload.is_empty() {
            self.logger.warn("node list unavailable").field("endpoint", &self.endpoint).log().await;
            return Arc::new(Vec::new());
        }

        match parse_node_list(&payload) {
            Ok(entries) if !entries.is_empty() => {
                let entries = Arc::new(entries);
                let _ = self.entries.set(entries.clone());
                self.logger.info("node list loaded").field("entries", entries.len()).log().await;
                entries
            }
            Ok(_) => {
                self.logger.warn("node list is empty").log().await;
                Arc::new(Vec::new())
            }
            Err(e) => {
                self.logger.warn("node list is not valid JSON").error_info(&e).log().await;
                Arc::new(Vec::new())
            }
        }
    }

    /// Dedicated targets for one carrier
    pub async fn targets_for(&self, carrier: Carrier) -> Vec<Target> {
        let entries = self.ensure_loaded().await;
        let ParseReport { records, skipped } = node_targets(&entries, carrier);
        for reason in &skipped {
            self.logger.info("skipped node").field("reason", reason).log().await;
        }
        records
    }

    pub fn is_loaded(&self) -> bool {
        self.entries.get().is_some()
    }

    /// How many times the remote list was requested
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}
