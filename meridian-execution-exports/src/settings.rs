// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_models::block_header::ChainId;
use meridian_models::node::NodeId;
use std::time::Duration;

/// Execution ingestion module configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// chain namespace this node executes
    pub chain_id: ChainId,
    /// identity of this execution node, stamped on computation results
    pub executor_id: NodeId,
    /// capacity of the command channel feeding the ingestion thread
    pub channel_size: usize,
    /// number of executor threads; sibling blocks execute in parallel
    pub executor_count: usize,
    /// a pending collection request is re-issued to the next cluster member
    /// after this long without an answer
    pub collection_request_timeout: Duration,
    /// period of the fetcher's retry sweep
    pub fetch_retry_interval: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            chain_id: ChainId(0),
            executor_id: NodeId(meridian_hash::Hash::compute_from(b"executor")),
            channel_size: meridian_models::constants::CHANNEL_SIZE,
            executor_count: 4,
            collection_request_timeout: Duration::from_secs(10),
            fetch_retry_interval: Duration::from_millis(500),
        }
    }
}
