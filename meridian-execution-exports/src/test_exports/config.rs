// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::ExecutionConfig;
use std::time::Duration;

/// Default configuration for tests: short timeouts so retry paths are
/// exercised within test deadlines.
pub fn default_testing_config() -> ExecutionConfig {
    ExecutionConfig {
        collection_request_timeout: Duration::from_millis(200),
        fetch_retry_interval: Duration::from_millis(50),
        executor_count: 4,
        ..Default::default()
    }
}
