// Copyright (c) 2022 MASSA LABS <info@massa.net>

use meridian_channel::receiver::MeridianReceiver;
use meridian_channel::sender::MeridianSender;
use meridian_channel::MeridianChannel;
use meridian_db_exports::ShareableDb;
use meridian_execution_exports::{
    BlockComputer, ChainState, CollectionRequester, ExecutionChannels, ExecutionConfig,
    ExecutionController, ExecutionManager, Uploader,
};
use meridian_execution_state::ExecutionStateStore;
use meridian_storage::Storage;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread;

use crate::commands::IngestionCommand;
use crate::controller::{ExecutionControllerImpl, ExecutionManagerImpl};
use crate::executor::{spawn_executor_threads, ExecutionJob, ExecutorContext};
use crate::fetcher::FetchThread;
use crate::loader::BlockLoader;
use crate::metrics::ExecutionMetrics;
use crate::state::IngestionState;
use crate::stop::StopControl;
use crate::upload::UploadManager;

mod init;
mod main_loop;

/// The ingestion worker structure: everything the ingestion thread needs to
/// drive blocks from "announced" to "results persisted".
pub(crate) struct ExecutionWorker {
    /// Configuration of the module
    config: ExecutionConfig,
    /// Channel to receive commands from the controller and helper threads
    command_receiver: MeridianReceiver<IngestionCommand>,
    /// State shared with the controller
    shared_state: Arc<RwLock<IngestionState>>,
    /// Channel to the collection fetch thread
    fetcher_tx: MeridianSender<crate::commands::FetcherCommand>,
    /// Channel feeding the executor pool; dropping it stops the executors
    job_tx: MeridianSender<ExecutionJob>,
    /// Durable execution state
    store: ExecutionStateStore,
    /// Stop point controller, shared with the controller
    stop_control: StopControl,
    /// Catch-up loader
    loader: BlockLoader,
    /// Shared collection storage
    storage: Storage,
    /// Links to the rest of the node
    channels: ExecutionChannels,
    /// Event counters
    metrics: ExecutionMetrics,
    /// Set once an irrecoverable failure was reported; ends the loop
    fatal_hit: bool,
}

/// Create and start a new ingestion worker.
///
/// # Arguments
/// * `config`: execution module configuration
/// * `channels`: channels to communicate with the rest of the node
/// * `chain_state`: read-only protocol state
/// * `computer`: the computation layer executing complete blocks
/// * `requester`: out-of-band transport for collection requests
/// * `uploaders`: result upload sinks, independent of one another
/// * `storage`: shared collection storage
/// * `db`: storage engine handle carrying the durable execution state
///
/// # Returns
/// * the execution controller to communicate with the worker
/// * the execution manager to stop the worker
pub fn start_execution_worker(
    config: ExecutionConfig,
    channels: ExecutionChannels,
    chain_state: Arc<dyn ChainState>,
    computer: Arc<dyn BlockComputer>,
    requester: Arc<dyn CollectionRequester>,
    uploaders: Vec<Arc<dyn Uploader>>,
    storage: Storage,
    db: ShareableDb,
) -> (Box<dyn ExecutionController>, Box<dyn ExecutionManager>) {
    let store = ExecutionStateStore::new(db);
    let metrics = ExecutionMetrics::new();

    let (command_tx, command_rx) = MeridianChannel::new::<IngestionCommand>(
        "execution_command".to_string(),
        Some(config.channel_size),
    );
    let (fetcher_tx, fetcher_rx) = MeridianChannel::new::<crate::commands::FetcherCommand>(
        "collection_fetch".to_string(),
        Some(config.channel_size),
    );
    let (job_tx, job_rx) =
        MeridianChannel::new::<ExecutionJob>("execution_jobs".to_string(), Some(config.channel_size));

    let stop_control = StopControl::new(store.clone(), chain_state.clone());
    let shared_state = Arc::new(RwLock::new(IngestionState::new()));

    let upload_manager = UploadManager::new(uploaders, metrics.clone());
    let executor_context = Arc::new(ExecutorContext {
        computer,
        upload_manager,
        store: store.clone(),
        ingestion_tx: command_tx.clone(),
        metrics: metrics.clone(),
    });
    let executor_handles = spawn_executor_threads(
        config.executor_count.max(1),
        job_rx,
        executor_context,
    );

    let mut fetch_thread = FetchThread::new(
        config.clone(),
        storage.clone(),
        chain_state.clone(),
        requester,
        fetcher_rx,
        command_tx.clone(),
        metrics.clone(),
    );
    let fetcher_handle = thread::Builder::new()
        .name("collection-fetcher".into())
        .spawn(move || fetch_thread.run())
        .expect("Can't spawn collection fetch thread.");

    let loader = BlockLoader::new(chain_state, store.clone());
    let mut worker = ExecutionWorker::new(
        config,
        command_rx,
        shared_state.clone(),
        fetcher_tx.clone(),
        job_tx,
        store,
        stop_control.clone(),
        loader,
        storage,
        channels,
        metrics,
    );
    let ingestion_handle = thread::Builder::new()
        .name("execution-ingestion".into())
        .spawn(move || worker.run())
        .expect("Can't spawn ingestion thread.");

    let controller = ExecutionControllerImpl {
        command_tx: command_tx.clone(),
        fetcher_tx: fetcher_tx.clone(),
        shared_state,
        stop_control,
    };
    let manager = ExecutionManagerImpl {
        command_tx,
        fetcher_tx,
        ingestion_handle: Some(ingestion_handle),
        fetcher_handle: Some(fetcher_handle),
        executor_handles,
    };

    (Box::new(controller), Box::new(manager))
}
