// Copyright (c) 2022 MASSA LABS <info@massa.net>

use super::ExecutionWorker;
use crate::commands::FetcherCommand;
use crate::executor::ExecutionJob;
use crate::loader::BlockLoader;
use crate::metrics::ExecutionMetrics;
use crate::state::IngestionState;
use crate::stop::StopControl;
use meridian_channel::receiver::MeridianReceiver;
use meridian_channel::sender::MeridianSender;
use meridian_execution_exports::{ExecutionChannels, ExecutionConfig, ExecutionError};
use meridian_execution_state::ExecutionStateStore;
use meridian_storage::Storage;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

impl ExecutionWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ExecutionConfig,
        command_receiver: MeridianReceiver<crate::commands::IngestionCommand>,
        shared_state: Arc<RwLock<IngestionState>>,
        fetcher_tx: MeridianSender<FetcherCommand>,
        job_tx: MeridianSender<ExecutionJob>,
        store: ExecutionStateStore,
        stop_control: StopControl,
        loader: BlockLoader,
        storage: Storage,
        channels: ExecutionChannels,
        metrics: ExecutionMetrics,
    ) -> Self {
        ExecutionWorker {
            config,
            command_receiver,
            shared_state,
            fetcher_tx,
            job_tx,
            store,
            stop_control,
            loader,
            storage,
            channels,
            metrics,
            fatal_hit: false,
        }
    }

    /// Startup sequence: re-arm a persisted stop against the current
    /// finalized head, then replay every unexecuted finalized block.
    pub(crate) fn init(&mut self) -> Result<(), ExecutionError> {
        self.stop_control.reload()?;

        let blocks = self.loader.load_unexecuted()?;
        if !blocks.is_empty() {
            info!(
                "catching up on {} unexecuted finalized block(s)",
                blocks.len()
            );
        }
        for block in blocks {
            self.on_block_processable(block);
        }
        self.dispatch_ready();
        Ok(())
    }
}
