//! src/prefetch/mod.rs
//!
//! Background prefetching for data pipelines.
//!
//! A `Prefetcher` runs a source iterator on its own thread so that producing the
//! next item (decoding, feature extraction, reading from disk) overlaps with
//! whatever the consumer does with the current one.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────────┐      Item(T) / Done / Error       ┌────────────┐
//!   │ producer thread│ ───── bounded channel (N) ──────→ │  consumer  │
//!   │  source.next() │                                   │  .next()   │
//!   └────────────────┘ ←──── stop flag (close/drop) ──── └────────────┘
//! ```
//!
//! - The producer blocks when N items are waiting (backpressure).
//! - The consumer blocks when nothing is waiting.
//! - Ordering is strict FIFO; lookahead is N items plus the one being computed.
//!
//! # Module Structure
//!
//! ```text
//! src/prefetch/
//! ├── mod.rs          # Public API exports + architecture docs
//! ├── config.rs       # PrefetchConfig and builder
//! ├── prefetcher.rs   # Prefetcher, producer loop
//! └── background.rs   # Wrapper functions and the PrefetchExt trait
//! ```
//!
//! # Example Usage
//!
//! ```ignore
//! let mut batches = Prefetcher::new(load_batches(), 2)?;
//! while let Some(batch) = batches.next() {
//!     let batch = batch?;
//!     // ...
//! }
//! batches.close()?; // optional, drop does the same
//! ```

mod background;
mod config;
mod prefetcher;

pub use background::{background, background_with, try_background, try_background_with, PrefetchExt};
pub use config::{PrefetchConfig, PrefetchConfigBuilder, DEFAULT_CAPACITY, DEFAULT_THREAD_NAME};
pub use prefetcher::{PrefetchState, Prefetcher};
