// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Fan-out of computation results to the configured upload sinks.
//! Uploaders are independent: a failing one is logged and counted, and the
//! remaining uploaders still receive the result. Upload failures never fail
//! the block.

use crate::metrics::ExecutionMetrics;
use meridian_execution_exports::{ComputationResult, Uploader};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub(crate) struct UploadManager {
    uploaders: Vec<Arc<dyn Uploader>>,
    metrics: ExecutionMetrics,
}

impl UploadManager {
    pub(crate) fn new(uploaders: Vec<Arc<dyn Uploader>>, metrics: ExecutionMetrics) -> Self {
        UploadManager { uploaders, metrics }
    }

    /// Hand `result` to every uploader in turn.
    pub(crate) fn upload_all(&self, result: &ComputationResult) {
        for uploader in &self.uploaders {
            if let Err(err) = uploader.upload(result) {
                warn!(
                    "uploader failed for block {}: {}",
                    result.block_id, err
                );
                self.metrics.inc_upload_failures();
            }
        }
    }
}
