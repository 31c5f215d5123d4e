//! src/prefetch/config.rs
//!
//! Configuration for `Prefetcher` behaviour.
//!
//! Example:
//! ```ignore
//! let config = PrefetchConfig::builder()
//!     .capacity(4)
//!     .thread_name("feature-loader")
//!     .build();
//!
//! let prefetcher = Prefetcher::with_config(source, &config)?;
//! ```
//!
//! # Memory considerations:
//! - `capacity`: at most `capacity` produced items wait in the buffer, plus the
//!               one item the producer is currently computing.

use anyhow::{bail, Result};

/// Default number of items produced ahead of the consumer.
pub const DEFAULT_CAPACITY: usize = 1;

/// Default name of the background producer thread.
pub const DEFAULT_THREAD_NAME: &str = "prefetch-producer";

/// Configuration for a `Prefetcher`
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Number of items buffered ahead of the consumer (must be > 0)
    pub capacity: usize,
    /// Name given to the producer thread (shows up in panics and debuggers)
    pub thread_name: String,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PrefetchConfig {
    pub fn builder() -> PrefetchConfigBuilder {
        PrefetchConfigBuilder::default()
    }

    /// Shorthand for a default config with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Rejects configurations that cannot produce a working prefetcher.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            bail!(
                "Invalid prefetch capacity 0. \
                 capacity must be >= 1 so the producer can hand over at least one item."
            );
        }
        if self.thread_name.is_empty() {
            bail!("Invalid prefetch thread name: must not be empty");
        }
        Ok(())
    }
}

/// Builder for PrefetchConfig with method chaining
#[derive(Default)]
pub struct PrefetchConfigBuilder {
    config: PrefetchConfig,
}

impl PrefetchConfigBuilder {
    /// Set how many items may be produced ahead of the consumer.
    ///
    /// - Too low: the consumer stalls whenever one item is slow to produce.
    /// - Too high: more finished items held in memory at once.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the producer thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PrefetchConfig {
        self.config
    }
}
