// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Executor pool: a fixed set of threads draining ready blocks from the
//! ingestion thread. Each job runs compute, then the upload fan-out, then
//! persistence, strictly in that order, and reports the outcome back on the
//! command channel.

use crate::commands::IngestionCommand;
use crate::metrics::ExecutionMetrics;
use crate::upload::UploadManager;
use meridian_channel::receiver::MeridianReceiver;
use meridian_channel::sender::MeridianSender;
use meridian_execution_exports::{BlockComputer, ExecutableBlock, ExecutionError};
use meridian_execution_state::ExecutionStateStore;
use meridian_models::result_id::ResultId;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// One ready block, start state set, parent result known.
pub(crate) struct ExecutionJob {
    pub(crate) block: ExecutableBlock,
    pub(crate) previous_result_id: ResultId,
}

/// Everything an executor thread needs.
pub(crate) struct ExecutorContext {
    pub(crate) computer: Arc<dyn BlockComputer>,
    pub(crate) upload_manager: UploadManager,
    pub(crate) store: ExecutionStateStore,
    pub(crate) ingestion_tx: MeridianSender<IngestionCommand>,
    pub(crate) metrics: ExecutionMetrics,
}

/// Spawn `count` executor threads sharing one job channel. The threads end
/// when the job channel disconnects.
pub(crate) fn spawn_executor_threads(
    count: usize,
    job_rx: MeridianReceiver<ExecutionJob>,
    context: Arc<ExecutorContext>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            let job_rx = job_rx.clone();
            let context = context.clone();
            thread::Builder::new()
                .name(format!("execution-worker-{}", index))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        process_job(&context, job);
                    }
                    info!("execution worker {} stopped", index);
                })
                .expect("Can't spawn execution worker thread.")
        })
        .collect()
}

fn process_job(context: &ExecutorContext, job: ExecutionJob) {
    let block_id = job.block.id();
    let height = job.block.height();
    debug!("executing block {} at height {}", block_id, height);

    let result = match context
        .computer
        .compute_block(job.previous_result_id, &job.block)
    {
        Ok(result) => result,
        Err(error) => {
            report(
                context,
                IngestionCommand::ExecutionFailed { block_id, error },
            );
            return;
        }
    };

    // upload before persistence; failures inside the manager are logged and
    // never reach this level
    context.upload_manager.upload_all(&result);

    if let Err(err) = context.store.save_execution_results(&result) {
        report(
            context,
            IngestionCommand::ExecutionFailed {
                block_id,
                error: ExecutionError::InvariantViolation(format!(
                    "persisting results of block {} failed: {}",
                    block_id, err
                )),
            },
        );
        return;
    }

    context.metrics.inc_blocks_executed();
    report(
        context,
        IngestionCommand::ExecutionDone {
            block_id,
            height,
            commitment: result.new_state_commitment,
        },
    );
}

fn report(context: &ExecutorContext, command: IngestionCommand) {
    if let Err(err) = context.ingestion_tx.send(command) {
        // only happens while the engine is tearing down
        warn!("executor could not report to ingestion thread: {}", err);
    }
}
