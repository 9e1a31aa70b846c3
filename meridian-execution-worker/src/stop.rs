// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Controlled stop point of the execution node.
//!
//! Once stop parameters are installed, no block at or above the stop height
//! is dispatched. When finalization crosses the stop height the stop becomes
//! *armed*: the parameters are frozen and, as soon as the boundary block
//! (the one right below the stop height) has a persisted commitment, the
//! engine-wide `execution_stopped` latch flips.
//!
//! The latch decision and the boundary-commitment query happen under one
//! mutex: an execution finishing exactly while finalization crosses the
//! stop height either flips the latch itself or is observed by the
//! finalization path, never neither.

use meridian_execution_exports::{ChainState, ExecutionError, StopParameters};
use meridian_execution_state::ExecutionStateStore;
use meridian_models::block_header::BlockHeader;
use meridian_models::block_id::BlockId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

struct StopState {
    params: Option<StopParameters>,
    /// a finalized block at or above the stop height has been observed
    armed: bool,
    /// the finalized block right below the stop height, once known
    boundary_id: Option<BlockId>,
    /// nothing below the stop is still executing, nothing above ever will
    execution_stopped: bool,
}

/// Shared stop controller. Cheap to clone; every clone sees the same state.
#[derive(Clone)]
pub struct StopControl {
    state: Arc<Mutex<StopState>>,
    store: ExecutionStateStore,
    chain_state: Arc<dyn ChainState>,
}

impl StopControl {
    /// Create a stop controller with no stop configured.
    pub fn new(store: ExecutionStateStore, chain_state: Arc<dyn ChainState>) -> Self {
        StopControl {
            state: Arc::new(Mutex::new(StopState {
                params: None,
                armed: false,
                boundary_id: None,
                execution_stopped: false,
            })),
            store,
            chain_state,
        }
    }

    /// Reload persisted stop parameters and re-arm against the current
    /// finalized head. Called once at worker start.
    pub fn reload(&self) -> Result<(), ExecutionError> {
        let persisted = self
            .store
            .get_stop_parameters()
            .map_err(|err| ExecutionError::ChainStateError(err.to_string()))?;
        let Some(params) = persisted else {
            return Ok(());
        };
        let head = self.chain_state.finalized_head()?;
        {
            let mut state = self.state.lock();
            state.params = Some(params);
            info!(
                "reloaded stop parameters: stop before height {}",
                params.stop_before_height
            );
        }
        if head.height >= params.stop_before_height {
            // the stop was crossed while the node was down
            self.on_block_finalized(&head);
        }
        Ok(())
    }

    /// Install a stop point. Refused once armed, and refused when the stop
    /// height is already finalized (it could never take effect cleanly).
    pub fn set_stop_parameters(&self, params: StopParameters) -> Result<(), ExecutionError> {
        let head = self.chain_state.finalized_head()?;
        let mut state = self.state.lock();
        if state.armed {
            return Err(ExecutionError::StopRefused(
                "stop already armed by finalization".to_string(),
            ));
        }
        if params.stop_before_height <= head.height {
            return Err(ExecutionError::StopRefused(format!(
                "stop height {} is not above the finalized head {}",
                params.stop_before_height, head.height
            )));
        }
        self.store
            .set_stop_parameters(Some(params))
            .map_err(|err| ExecutionError::StopRefused(err.to_string()))?;
        state.params = Some(params);
        info!("stop before height {} installed", params.stop_before_height);
        Ok(())
    }

    /// Remove a pending stop point. Refused once armed.
    pub fn clear_stop_parameters(&self) -> Result<(), ExecutionError> {
        let mut state = self.state.lock();
        if state.armed {
            return Err(ExecutionError::StopRefused(
                "stop already armed by finalization".to_string(),
            ));
        }
        self.store
            .set_stop_parameters(None)
            .map_err(|err| ExecutionError::StopRefused(err.to_string()))?;
        state.params = None;
        info!("pending stop parameters cleared");
        Ok(())
    }

    /// Currently configured stop point, if any.
    pub fn get_stop_parameters(&self) -> Option<StopParameters> {
        self.state.lock().params
    }

    /// Whether a block at `height` may be dispatched for execution.
    /// As soon as stop parameters are set, every height at or above the stop
    /// height is refused; arming only freezes the parameters.
    pub fn should_execute(&self, height: u64) -> bool {
        let state = self.state.lock();
        match state.params {
            Some(params) => height < params.stop_before_height,
            None => true,
        }
    }

    /// Whether the armed stop has fully taken effect.
    pub fn is_execution_stopped(&self) -> bool {
        self.state.lock().execution_stopped
    }

    /// Observe a finalization event. Arms the stop when the header crosses
    /// the stop height; returns true when the `execution_stopped` latch
    /// flipped during this call.
    pub fn on_block_finalized(&self, header: &BlockHeader) -> bool {
        let mut state = self.state.lock();
        let Some(params) = state.params else {
            return false;
        };
        if header.height < params.stop_before_height || state.execution_stopped {
            return false;
        }
        if !state.armed {
            state.armed = true;
            info!(
                "stop before height {} armed by finalization of height {}",
                params.stop_before_height, header.height
            );
        }

        // resolve the boundary block: the finalized block right below the
        // stop height
        if state.boundary_id.is_none() {
            state.boundary_id = if header.height == params.stop_before_height {
                Some(header.parent_id)
            } else {
                match self
                    .chain_state
                    .finalized_block_by_height(params.stop_before_height - 1)
                {
                    Ok(Some(block)) => Some(block.id()),
                    Ok(None) => None,
                    Err(err) => {
                        warn!("stop control could not resolve boundary block: {}", err);
                        None
                    }
                }
            };
        }

        // the boundary query and the latch write stay under this lock: an
        // execution completing now either sees the armed state in
        // `on_block_executed` or its commitment is visible to this query
        if let Some(boundary_id) = state.boundary_id {
            match self.store.is_block_executed(&boundary_id) {
                Ok(true) => {
                    state.execution_stopped = true;
                    info!(
                        "execution stopped before height {}",
                        params.stop_before_height
                    );
                    return true;
                }
                Ok(false) => {}
                Err(err) => {
                    warn!("stop control could not query boundary commitment: {}", err);
                }
            }
        }
        false
    }

    /// Observe a completed execution. Returns true when the
    /// `execution_stopped` latch flipped during this call.
    pub fn on_block_executed(&self, block_id: &BlockId, height: u64) -> bool {
        let mut state = self.state.lock();
        let Some(params) = state.params else {
            return false;
        };
        if !state.armed || state.execution_stopped {
            return false;
        }
        let is_boundary = match state.boundary_id {
            Some(boundary_id) => boundary_id == *block_id,
            // boundary unresolved (gap in finalized heights): fall back to
            // the height right below the stop
            None => height + 1 == params.stop_before_height,
        };
        if is_boundary {
            state.execution_stopped = true;
            info!(
                "execution stopped before height {}",
                params.stop_before_height
            );
            return true;
        }
        false
    }
}
