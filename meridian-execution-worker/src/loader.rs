// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Catch-up loader: walks the finalized chain from the highest executed
//! block to the finalized head and replays the blocks in between as
//! processable notifications. Used at startup and on every finalization
//! event; the watermark guarantees monotone emission within one run.

use meridian_execution_exports::{ChainState, ExecutionError};
use meridian_execution_state::{ExecutionStateError, ExecutionStateStore};
use meridian_models::block::Block;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct BlockLoader {
    chain_state: Arc<dyn ChainState>,
    store: ExecutionStateStore,
    /// highest height already emitted this run
    watermark: Option<u64>,
}

impl BlockLoader {
    pub(crate) fn new(chain_state: Arc<dyn ChainState>, store: ExecutionStateStore) -> Self {
        BlockLoader {
            chain_state,
            store,
            watermark: None,
        }
    }

    /// Every finalized block above the watermark, in increasing height
    /// order. The first call positions the watermark on the highest
    /// executed block.
    pub(crate) fn load_unexecuted(&mut self) -> Result<Vec<Block>, ExecutionError> {
        let start = match self.watermark {
            Some(watermark) => watermark + 1,
            None => {
                let (executed_height, executed_id) =
                    self.store.get_highest_executed_block().map_err(map_state_err)?;
                debug!(
                    "loader starting above executed block {} at height {}",
                    executed_id, executed_height
                );
                self.watermark = Some(executed_height);
                executed_height + 1
            }
        };

        let head = self.chain_state.finalized_head()?;
        let mut blocks = Vec::new();
        for height in start..=head.height {
            match self.chain_state.finalized_block_by_height(height)? {
                Some(block) => {
                    self.watermark = Some(height);
                    blocks.push(block);
                }
                None => {
                    // a gap means consensus has not caught up at this height
                    warn!("no finalized block known at height {}", height);
                    break;
                }
            }
        }
        if !blocks.is_empty() {
            debug!(
                "loader emitting {} finalized block(s) up to height {}",
                blocks.len(),
                self.watermark.unwrap_or_default()
            );
        }
        Ok(blocks)
    }
}

fn map_state_err(err: ExecutionStateError) -> ExecutionError {
    match err {
        ExecutionStateError::NotBootstrapped => ExecutionError::InvariantViolation(
            "execution state store holds no executed block".to_string(),
        ),
        other => ExecutionError::ChainStateError(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_db_exports::test_exports::MemoryDb;
    use meridian_execution_exports::test_exports::{
        commitment_for, empty_block, genesis_block, node_id_fixture, MockChainState,
    };

    fn setup() -> (BlockLoader, MockChainState, ExecutionStateStore) {
        let genesis = genesis_block();
        let chain_state = MockChainState::new(genesis.clone(), vec![node_id_fixture("peer")]);
        let store = ExecutionStateStore::new(MemoryDb::new_shareable());
        store
            .bootstrap(genesis.id(), 0, commitment_for(&genesis.id()))
            .unwrap();
        let loader = BlockLoader::new(Arc::new(chain_state.clone()), store.clone());
        (loader, chain_state, store)
    }

    #[test]
    fn test_loads_between_executed_and_head() {
        let (mut loader, chain_state, _) = setup();
        let genesis = genesis_block();
        let block_a = empty_block(&genesis, 1);
        let block_b = empty_block(&block_a, 2);
        for block in [&block_a, &block_b] {
            chain_state.register_block(block);
            chain_state.finalize_block(&block.id());
        }

        let blocks = loader.load_unexecuted().unwrap();
        assert_eq!(
            blocks.iter().map(|b| b.id()).collect::<Vec<_>>(),
            vec![block_a.id(), block_b.id()]
        );
    }

    #[test]
    fn test_emission_is_monotone() {
        let (mut loader, chain_state, _) = setup();
        let genesis = genesis_block();
        let block_a = empty_block(&genesis, 1);
        chain_state.register_block(&block_a);
        chain_state.finalize_block(&block_a.id());

        assert_eq!(loader.load_unexecuted().unwrap().len(), 1);
        // nothing new finalized: nothing re-emitted
        assert!(loader.load_unexecuted().unwrap().is_empty());

        let block_b = empty_block(&block_a, 2);
        chain_state.register_block(&block_b);
        chain_state.finalize_block(&block_b.id());
        let blocks = loader.load_unexecuted().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id(), block_b.id());
    }

    #[test]
    fn test_nothing_to_load_at_head() {
        let (mut loader, _, _) = setup();
        assert!(loader.load_unexecuted().unwrap().is_empty());
    }
}
