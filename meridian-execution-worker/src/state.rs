// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::queue::ExecutionQueue;

/// State shared between the ingestion thread (writer) and the controller
/// (reader). Command sending and state reading are mutually asynchronous:
/// a freshly posted command is not yet reflected here.
pub(crate) struct IngestionState {
    /// pending and in-flight blocks
    pub queue: ExecutionQueue,
    /// while true, ready blocks stay queued and nothing is dispatched
    pub paused: bool,
}

impl IngestionState {
    pub(crate) fn new() -> Self {
        IngestionState {
            queue: ExecutionQueue::new(),
            paused: false,
        }
    }
}
