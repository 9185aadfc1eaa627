#![allow(dead_code)]

use std::time::Duration;

use prochub::exec::{ProcessRegistry, ProcessSettings};
use prochub::types::GroupSnapshot;
use prochub_test_utils::builders::ConfigFileBuilder;
use prochub_test_utils::wait_until;

pub use prochub_test_utils::{init_tracing, with_timeout};

pub const SH: &str = "/bin/sh";

/// Settings with a short read window so tests stay fast.
pub fn fast_settings() -> ProcessSettings {
    ConfigFileBuilder::new().read_settle_ms(100).process_settings()
}

pub fn registry() -> ProcessRegistry {
    ProcessRegistry::new(fast_settings())
}

/// Argument list for `/bin/sh -c <script>`.
pub fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

/// Wait until the group has no pending or running tasks and return it.
pub async fn wait_finished(registry: &ProcessRegistry, id: &str) -> GroupSnapshot {
    let finished = wait_until(Duration::from_secs(5), || {
        registry.get(id).is_some_and(|group| !group.active)
    })
    .await;
    assert!(finished, "group '{id}' did not finish in time");
    registry.get(id).expect("group should exist")
}

/// Wait until the first task of the group has a pid.
pub async fn wait_running(registry: &ProcessRegistry, id: &str) {
    let running = wait_until(Duration::from_secs(5), || {
        registry
            .get(id)
            .and_then(|group| group.tasks.first().and_then(|task| task.pid))
            .is_some()
    })
    .await;
    assert!(running, "group '{id}' did not start in time");
}
