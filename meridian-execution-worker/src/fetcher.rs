// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Collection fetch thread.
//!
//! Owns the map of pending collection requests: at most one request is in
//! flight per collection id, answers are validated before they reach
//! storage, and unanswered requests are re-issued to the next cluster
//! member on a timer.

use crate::commands::{FetcherCommand, IngestionCommand};
use crate::metrics::ExecutionMetrics;
use crossbeam::channel::tick;
use crossbeam::select;
use meridian_channel::receiver::MeridianReceiver;
use meridian_channel::sender::MeridianSender;
use meridian_execution_exports::{ChainState, CollectionRequester, ExecutionConfig};
use meridian_models::block_id::BlockId;
use meridian_models::collection::{Collection, CollectionGuarantee, CollectionId};
use meridian_models::node::NodeId;
use meridian_models::prehash::{PreHashMap, PreHashSet};
use meridian_storage::Storage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One collection being fetched.
struct PendingFetch {
    /// the guarantee that caused the request; pins the guarantor cluster
    guarantee: CollectionGuarantee,
    /// blocks waiting for this collection
    waiting_blocks: PreHashSet<BlockId>,
    /// when the current request was issued
    asked_at: Instant,
    /// how many requests were issued so far; also the round-robin cursor
    attempts: u32,
}

pub(crate) struct FetchThread {
    config: ExecutionConfig,
    storage: Storage,
    chain_state: Arc<dyn ChainState>,
    requester: Arc<dyn CollectionRequester>,
    receiver: MeridianReceiver<FetcherCommand>,
    ingestion_tx: MeridianSender<IngestionCommand>,
    pending: PreHashMap<CollectionId, PendingFetch>,
    metrics: ExecutionMetrics,
}

impl FetchThread {
    pub(crate) fn new(
        config: ExecutionConfig,
        storage: Storage,
        chain_state: Arc<dyn ChainState>,
        requester: Arc<dyn CollectionRequester>,
        receiver: MeridianReceiver<FetcherCommand>,
        ingestion_tx: MeridianSender<IngestionCommand>,
        metrics: ExecutionMetrics,
    ) -> Self {
        FetchThread {
            config,
            storage,
            chain_state,
            requester,
            receiver,
            ingestion_tx,
            pending: PreHashMap::default(),
            metrics,
        }
    }

    pub(crate) fn run(&mut self) {
        let retry_tick = tick(self.config.fetch_retry_interval);
        loop {
            select! {
                recv(self.receiver) -> msg => {
                    self.receiver.update_metrics();
                    match msg {
                        Ok(FetcherCommand::EnsureCollections { block_id, guarantees }) => {
                            self.ensure_collections(block_id, guarantees);
                        }
                        Ok(FetcherCommand::CollectionReceived { origin, collection }) => {
                            self.on_collection(origin, collection);
                        }
                        Ok(FetcherCommand::Stop) => {
                            info!("stop collection fetch thread");
                            return;
                        }
                        Err(_) => {
                            info!("stop collection fetch thread: channel disconnected");
                            return;
                        }
                    }
                },
                recv(retry_tick) -> _ => {
                    self.retry_sweep();
                }
            }
        }
    }

    /// Make sure every guaranteed collection of `block_id` reaches storage.
    /// Collections already stored are reported back synchronously; the rest
    /// get at most one in-flight request each.
    fn ensure_collections(&mut self, block_id: BlockId, guarantees: Vec<CollectionGuarantee>) {
        for guarantee in guarantees {
            let collection_id = guarantee.collection_id;
            if self.storage.contains(&collection_id) {
                self.notify_stored(collection_id, vec![block_id]);
                continue;
            }
            if let Some(pending) = self.pending.get_mut(&collection_id) {
                // request already in flight, just register the new dependent
                pending.waiting_blocks.insert(block_id);
                continue;
            }
            let mut waiting_blocks = PreHashSet::default();
            waiting_blocks.insert(block_id);
            let mut pending = PendingFetch {
                guarantee,
                waiting_blocks,
                asked_at: Instant::now(),
                attempts: 0,
            };
            self.issue_request(collection_id, &mut pending);
            self.pending.insert(collection_id, pending);
        }
    }

    /// Validation gate then store: on success, every block waiting on the
    /// collection is reported to the ingestion thread.
    fn on_collection(&mut self, origin: NodeId, collection: Collection) {
        let collection_id = collection.id();
        let Some(pending) = self.pending.get(&collection_id) else {
            if self.storage.contains(&collection_id) {
                // late duplicate of an already resolved fetch
                debug!("duplicate delivery of collection {}", collection_id);
            } else {
                warn!(
                    "peer {} sent unsolicited collection {}",
                    origin, collection_id
                );
                self.metrics.inc_operational_errors();
            }
            return;
        };

        // the collection id is its content hash, so matching the pending key
        // already proves integrity; what is left is checking the origin
        match self.chain_state.cluster_for_guarantee(&pending.guarantee) {
            Ok(cluster) => {
                if !cluster.contains(&origin) {
                    warn!(
                        "peer {} sent collection {} but is not in the guarantor cluster",
                        origin, collection_id
                    );
                    self.metrics.inc_operational_errors();
                    return;
                }
            }
            Err(err) => {
                warn!(
                    "could not resolve guarantor cluster of collection {}: {}",
                    collection_id, err
                );
                self.metrics.inc_operational_errors();
                return;
            }
        }

        let pending = self
            .pending
            .remove(&collection_id)
            .expect("pending fetch vanished while resolving");
        self.storage.store_collection(collection);
        self.storage
            .link_reference_block(pending.guarantee.reference_block_id, collection_id);
        self.metrics.inc_collections_fetched();
        debug!(
            "collection {} stored, {} block(s) waiting",
            collection_id,
            pending.waiting_blocks.len()
        );
        self.notify_stored(
            collection_id,
            pending.waiting_blocks.into_iter().collect(),
        );
    }

    /// Re-issue every request that has been unanswered for longer than the
    /// configured timeout, moving on to the next cluster member.
    fn retry_sweep(&mut self) {
        let timeout = self.config.collection_request_timeout;
        let mut stale: Vec<CollectionId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.asked_at.elapsed() >= timeout)
            .map(|(collection_id, _)| *collection_id)
            .collect();
        stale.sort_unstable();
        for collection_id in stale {
            if let Some(mut pending) = self.pending.remove(&collection_id) {
                debug!(
                    "collection {} unanswered after {} attempt(s), re-asking",
                    collection_id,
                    pending.attempts
                );
                self.issue_request(collection_id, &mut pending);
                self.pending.insert(collection_id, pending);
            }
        }
    }

    /// Send one request for `collection_id` to the next member of its
    /// guarantor cluster (round-robin).
    fn issue_request(&self, collection_id: CollectionId, pending: &mut PendingFetch) {
        pending.asked_at = Instant::now();
        let cluster = match self.chain_state.cluster_for_guarantee(&pending.guarantee) {
            Ok(cluster) if !cluster.is_empty() => cluster,
            Ok(_) => {
                warn!(
                    "no guarantor cluster known for collection {}",
                    collection_id
                );
                self.metrics.inc_operational_errors();
                return;
            }
            Err(err) => {
                warn!(
                    "could not resolve guarantor cluster of collection {}: {}",
                    collection_id, err
                );
                self.metrics.inc_operational_errors();
                return;
            }
        };
        let target = cluster[pending.attempts as usize % cluster.len()];
        pending.attempts = pending.attempts.saturating_add(1);
        if let Err(err) = self.requester.request_collection(collection_id, target) {
            // the retry sweep will re-ask another member
            warn!(
                "request for collection {} to {} failed: {}",
                collection_id, target, err
            );
            self.metrics.inc_operational_errors();
        }
    }

    fn notify_stored(&self, collection_id: CollectionId, blocks: Vec<BlockId>) {
        if let Err(err) = self.ingestion_tx.send(IngestionCommand::CollectionStored {
            collection_id,
            blocks,
        }) {
            warn!(
                "could not notify ingestion of stored collection {}: {}",
                collection_id, err
            );
        }
    }
}
