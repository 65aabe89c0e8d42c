//! Helpers for tests that talk to AWS

use chrono::Utc;
use shieldgate_common::defaults::REQUIRED_EDGE_REGION;
use std::sync::atomic::{AtomicU32, Ordering};

/// Region for AWS-backed tests: `AWS_REGION`, then `AWS_DEFAULT_REGION`,
/// then the edge region.
///
/// ```
/// let region = shieldgate_test_utils::get_test_region();
/// assert!(!region.is_empty());
/// ```
pub fn get_test_region() -> String {
    ["AWS_REGION", "AWS_DEFAULT_REGION"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| REQUIRED_EDGE_REGION.to_string())
}

/// Stack or resource name no other test run will produce:
/// `shieldgate-test-{label}-{timestamp_ms}-{counter}`.
///
/// ```
/// let name = shieldgate_test_utils::test_stack_name("edge");
/// assert!(name.starts_with("shieldgate-test-edge-"));
/// ```
pub fn test_stack_name(label: &str) -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("shieldgate-test-{label}-{}-{seq}", Utc::now().timestamp_millis())
}
