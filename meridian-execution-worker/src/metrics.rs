// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Prometheus counters of the ingestion engine, one per observable event
//! kind. Failures surface to operators only through these counters and the
//! structured logs.

use prometheus::Counter;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct ExecutionMetrics {
    blocks_executed: Counter,
    collections_fetched: Counter,
    operational_errors: Counter,
    fatal_errors: Counter,
    upload_failures: Counter,
}

fn register_counter(name: &str, help: &str) -> Counter {
    let counter = Counter::new(name.to_string(), help.to_string())
        .expect("Failed to create counter");
    if let Err(e) = prometheus::register(Box::new(counter.clone())) {
        debug!("Failed to register counter {} : {}", name, e);
    }
    counter
}

impl ExecutionMetrics {
    pub(crate) fn new() -> Self {
        ExecutionMetrics {
            blocks_executed: register_counter(
                "execution_blocks_executed_total",
                "Blocks executed and persisted",
            ),
            collections_fetched: register_counter(
                "execution_collections_fetched_total",
                "Collections fetched and stored",
            ),
            operational_errors: register_counter(
                "execution_operational_errors_total",
                "Dropped invalid inputs and transient request failures",
            ),
            fatal_errors: register_counter(
                "execution_fatal_errors_total",
                "Irrecoverable failures escalated to the node",
            ),
            upload_failures: register_counter(
                "execution_upload_failures_total",
                "Per-uploader failures, never fatal to the block",
            ),
        }
    }

    pub(crate) fn inc_blocks_executed(&self) {
        self.blocks_executed.inc();
    }

    pub(crate) fn inc_collections_fetched(&self) {
        self.collections_fetched.inc();
    }

    pub(crate) fn inc_operational_errors(&self) {
        self.operational_errors.inc();
    }

    pub(crate) fn inc_fatal_errors(&self) {
        self.fatal_errors.inc();
    }

    pub(crate) fn inc_upload_failures(&self) {
        self.upload_failures.inc();
    }
}
