//! Test helper utilities and common testing patterns

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    ///
    /// Uses the tokio clock, so it also works in tests with a paused clock.
    pub async fn wait_for<F, Fut>(condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        Self::wait_for_with_interval(condition, timeout, Duration::from_millis(10)).await
    }

    /// Wait for a condition with a custom poll interval
    pub async fn wait_for_with_interval<F, Fut>(
        mut condition: F,
        timeout: Duration,
        poll_interval: Duration,
    ) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            if condition().await {
                return true;
            }
            sleep(poll_interval).await;
        }

        condition().await
    }
}

/// Assertion helpers for common testing patterns
pub struct TestAssertions;

impl TestAssertions {
    /// Assert that a collection contains exactly the expected items (order independent)
    pub fn assert_contains_exactly<T: PartialEq + std::fmt::Debug>(actual: &[T], expected: &[T]) {
        assert_eq!(
            actual.len(),
            expected.len(),
            "Collections have different lengths. Actual: {:?}, Expected: {:?}",
            actual,
            expected
        );

        for expected_item in expected {
            assert!(
                actual.contains(expected_item),
                "Expected item {:?} not found in actual collection {:?}",
                expected_item,
                actual
            );
        }
    }

    /// Assert that all items in a collection satisfy a predicate
    pub fn assert_all<T, P>(items: &[T], predicate: P, message: &str)
    where
        P: Fn(&T) -> bool,
        T: std::fmt::Debug,
    {
        for item in items {
            assert!(predicate(item), "{}: Failed for item {:?}", message, item);
        }
    }
}
