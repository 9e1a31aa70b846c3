// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::events::ExecutionEvent;

/// Contains the links the execution module uses to talk to the rest of the
/// node.
#[derive(Clone)]
pub struct ExecutionChannels {
    /// Channel used by the engine to send events to the node globally
    pub controller_event_tx: crossbeam_channel::Sender<ExecutionEvent>,
}
