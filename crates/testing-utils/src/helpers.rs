//! Test helper utilities and common testing patterns

use std::time::{Duration, Instant};

use hoststat_core::models::ScriptDefinition;
use tokio::time::sleep;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    ///
    /// Script runs and collection ticks complete on pool workers, so tests
    /// poll for their side effects instead of awaiting them directly.
    pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();

        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition()
    }
}

/// Script fixtures
pub struct TestScripts;

impl TestScripts {
    /// Persists the bound counter reading multiplied by `factor`
    pub fn scaling(name: &str, counter_path: &str, factor: f64) -> ScriptDefinition {
        ScriptDefinition::new(
            name,
            format!("fn execute() {{ persist(getCounterValue() * {factor:?}); }}"),
            counter_path,
        )
    }

    /// Persists a constant
    pub fn constant(name: &str, counter_path: &str, value: f64) -> ScriptDefinition {
        ScriptDefinition::new(
            name,
            format!("fn execute() {{ persist({value:?}); }}"),
            counter_path,
        )
    }

    /// Throws from `execute`
    pub fn throwing(name: &str, counter_path: &str) -> ScriptDefinition {
        ScriptDefinition::new(
            name,
            r#"fn execute() { throw "script failure"; }"#,
            counter_path,
        )
    }

    /// Busy loop of `iterations` steps, then persists 1.0
    pub fn busy(name: &str, counter_path: &str, iterations: u64) -> ScriptDefinition {
        ScriptDefinition::new(
            name,
            format!(
                "fn execute() {{ let i = 0; while i < {iterations} {{ i += 1; }} persist(1.0); }}"
            ),
            counter_path,
        )
    }
}
