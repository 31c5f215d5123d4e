//! Background prefetching for iterators.
//!
//! A `Prefetcher` owns one producer thread that pulls from a source iterator and
//! pushes into a bounded channel, and exposes the receiving side as an iterator.
//! The consumer never sees the thread handle.
//!
//! # Key features
//! - Bounded channel: at most `capacity` finished items wait for the consumer
//! - Tagged messages: end of sequence and source errors travel in-band
//! - Scoped lifetime: `close()` (or drop) stops the producer and joins it

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use std::any::Any;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use super::config::PrefetchConfig;

/// What the producer thread hands to the consumer.
pub(crate) enum Message<T> {
    Item(T),
    /// Source exhausted. Sent exactly once, never together with `Error`.
    Done,
    /// Source failed. The producer stops pulling after sending this.
    Error(anyhow::Error),
}

/// Observable lifecycle of a `Prefetcher`.
///
/// `Running` covers the short window between spawning the producer and its
/// first pull as well; construction only returns once the thread is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchState {
    /// The producer may still deliver items.
    Running,
    /// Termination was observed (end, error or close). Terminal.
    Drained,
}

/// Iterator adapter that produces items on a background thread.
///
/// Yields `Ok(item)` in exactly the order the source produced them, then `None`.
/// If the source fails (or its thread panics) the failure is yielded once as
/// `Err`, after which the prefetcher is drained.
///
/// # Example
/// ```ignore
/// let batches = Prefetcher::new(load_batches(), 2)?;
/// for batch in batches {
///     train_step(batch?);
/// }
/// ```
pub struct Prefetcher<T> {
    output_rx: Option<Receiver<Message<T>>>,
    producer: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    capacity: usize,
    state: PrefetchState,
}

impl<T> Prefetcher<T>
where
    T: Send + 'static,
{
    /// Starts prefetching an infallible source, keeping up to `capacity` items ready.
    pub fn new<I>(source: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::with_config(source, &PrefetchConfig::with_capacity(capacity))
    }

    /// Starts prefetching a fallible source.
    ///
    /// The first `Err` from the source is forwarded to the consumer and ends
    /// production; later source items are never pulled.
    pub fn try_new<I>(source: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Result<T>>,
        I::IntoIter: Send + 'static,
    {
        Self::try_with_config(source, &PrefetchConfig::with_capacity(capacity))
    }

    /// Like [`Prefetcher::new`], configured by a [`PrefetchConfig`].
    pub fn with_config<I>(source: I, config: &PrefetchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        Self::try_with_config(source.into_iter().map(Ok), config)
    }

    /// Like [`Prefetcher::try_new`], configured by a [`PrefetchConfig`].
    pub fn try_with_config<I>(source: I, config: &PrefetchConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Result<T>>,
        I::IntoIter: Send + 'static,
    {
        config.validate()?;

        let (output_tx, output_rx) = bounded(config.capacity);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let source = source.into_iter();

        let producer = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || produce(source, output_tx, shutdown_clone))
            .with_context(|| {
                format!("Failed to spawn prefetch thread '{}'", config.thread_name)
            })?;

        debug!(
            "Started prefetch thread '{}' with capacity {}",
            config.thread_name, config.capacity
        );

        Ok(Self {
            output_rx: Some(output_rx),
            producer: Some(producer),
            shutdown,
            capacity: config.capacity,
            state: PrefetchState::Running,
        })
    }
}

impl<T> Prefetcher<T> {
    /// Maximum number of items buffered ahead of the consumer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items currently waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.output_rx.as_ref().map_or(0, |rx| rx.len())
    }

    pub fn state(&self) -> PrefetchState {
        self.state
    }

    /// True once termination has been returned or the prefetcher was closed.
    pub fn is_done(&self) -> bool {
        self.state == PrefetchState::Drained
    }

    /// Stops the producer and waits for its thread to exit.
    ///
    /// A source call that is already running completes before this returns.
    /// Buffered items are discarded. Calling `close` more than once is a no-op.
    /// Returns an error if the producer thread panicked.
    pub fn close(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Release);
        self.state = PrefetchState::Drained;

        // Dropping the receiver wakes a producer blocked on a full buffer.
        self.output_rx.take();

        if let Some(handle) = self.producer.take() {
            handle.join().map_err(|payload| {
                anyhow!(
                    "Prefetch producer thread panicked: {}",
                    panic_message(&*payload)
                )
            })?;
            debug!("Prefetch thread joined");
        }
        Ok(())
    }

    /// Builds the error reported when the channel disconnects without a
    /// terminal message, which only happens if the producer thread died.
    fn producer_failure(&mut self) -> anyhow::Error {
        match self.producer.take().map(|handle| handle.join()) {
            Some(Err(payload)) => anyhow!(
                "Prefetch producer thread panicked: {}",
                panic_message(&*payload)
            ),
            _ => anyhow!("Prefetch producer exited without signalling end of sequence"),
        }
    }
}

impl<T> Iterator for Prefetcher<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == PrefetchState::Drained {
            return None;
        }
        let output_rx = self.output_rx.as_ref()?;

        match output_rx.recv() {
            Ok(Message::Item(item)) => Some(Ok(item)),
            Ok(Message::Done) => {
                self.state = PrefetchState::Drained;
                None
            }
            Ok(Message::Error(e)) => {
                self.state = PrefetchState::Drained;
                Some(Err(e))
            }
            Err(_) => {
                self.state = PrefetchState::Drained;
                Some(Err(self.producer_failure()))
            }
        }
    }
}

impl<T> FusedIterator for Prefetcher<T> {}

impl<T> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{:#}", e);
        }
    }
}

impl<T> fmt::Debug for Prefetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prefetcher")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffered())
            .field("state", &self.state)
            .finish()
    }
}

/// Producer loop run on the background thread.
fn produce<T, I>(mut source: I, output_tx: Sender<Message<T>>, shutdown: Arc<AtomicBool>)
where
    I: Iterator<Item = Result<T>>,
{
    let mut produced = 0usize;

    loop {
        if shutdown.load(Ordering::Acquire) {
            debug!("Prefetch producer stopped by consumer after {} item(s)", produced);
            return;
        }

        let message = match source.next() {
            Some(Ok(item)) => Message::Item(item),
            Some(Err(e)) => Message::Error(
                e.context(format!("Prefetch source failed at item {}", produced)),
            ),
            None => Message::Done,
        };
        let terminal = !matches!(message, Message::Item(_));

        if output_tx.send(message).is_err() {
            debug!("Prefetch consumer dropped, producer exiting");
            return;
        }
        if terminal {
            debug!("Prefetch producer finished after {} item(s)", produced);
            return;
        }
        produced += 1;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
