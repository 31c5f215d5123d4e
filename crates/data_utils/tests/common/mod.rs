use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Source that records how many items have been pulled from it.
pub struct CountingSource {
    pub next_value: usize,
    pub limit: Option<usize>,
    pub pulled: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn finite(limit: usize) -> (Self, Arc<AtomicUsize>) {
        Self::create(Some(limit))
    }

    pub fn infinite() -> (Self, Arc<AtomicUsize>) {
        Self::create(None)
    }

    fn create(limit: Option<usize>) -> (Self, Arc<AtomicUsize>) {
        let pulled = Arc::new(AtomicUsize::new(0));
        let source = Self {
            next_value: 0,
            limit,
            pulled: pulled.clone(),
        };
        (source, pulled)
    }
}

impl Iterator for CountingSource {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.limit.map_or(false, |limit| self.next_value >= limit) {
            return None;
        }
        self.pulled.fetch_add(1, Ordering::SeqCst);
        let value = self.next_value;
        self.next_value += 1;
        Some(value)
    }
}

/// Yields `1..=len`, failing instead of yielding the value at `fail_at` (1-based).
/// Records every pull, including the failing one.
pub fn failing_source(
    len: u32,
    fail_at: u32,
    pulled: Arc<AtomicUsize>,
) -> impl Iterator<Item = Result<u32>> + Send + 'static {
    (1..=len).map(move |value| {
        pulled.fetch_add(1, Ordering::SeqCst);
        if value == fail_at {
            Err(anyhow!("corrupt record {}", value))
        } else {
            Ok(value)
        }
    })
}

/// Polls `condition` until it holds or `timeout` passes. Returns the final result.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
