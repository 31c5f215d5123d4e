//! Wrapper forms of `Prefetcher`.
//!
//! `background*` turn a function that returns an iterator into a function that
//! returns a running `Prefetcher` over that iterator. Each call of the wrapped
//! function starts an independent producer thread with its own buffer.
//!
//! ```ignore
//! let load_epoch = background(2, || dataset.iter())?;
//! for batch in load_epoch()? {
//!     let batch = batch?;
//! }
//! ```
//!
//! Functions of several arguments go through `background_with` with a tuple.

use anyhow::Result;

use super::config::PrefetchConfig;
use super::prefetcher::Prefetcher;

/// Wraps a zero-argument iterator factory.
///
/// `capacity` is validated here, once, rather than on every call.
pub fn background<F, I, T>(capacity: usize, f: F) -> Result<impl Fn() -> Result<Prefetcher<T>>>
where
    F: Fn() -> I,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    let config = PrefetchConfig::with_capacity(capacity);
    config.validate()?;
    Ok(move || Prefetcher::with_config(f(), &config))
}

/// Wraps a one-argument iterator factory.
pub fn background_with<F, A, I, T>(
    capacity: usize,
    f: F,
) -> Result<impl Fn(A) -> Result<Prefetcher<T>>>
where
    F: Fn(A) -> I,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    let config = PrefetchConfig::with_capacity(capacity);
    config.validate()?;
    Ok(move |arg: A| Prefetcher::with_config(f(arg), &config))
}

/// Fallible counterpart of [`background`] for factories yielding `Result<T>`.
pub fn try_background<F, I, T>(
    capacity: usize,
    f: F,
) -> Result<impl Fn() -> Result<Prefetcher<T>>>
where
    F: Fn() -> I,
    I: IntoIterator<Item = Result<T>>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    let config = PrefetchConfig::with_capacity(capacity);
    config.validate()?;
    Ok(move || Prefetcher::try_with_config(f(), &config))
}

/// Fallible counterpart of [`background_with`].
pub fn try_background_with<F, A, I, T>(
    capacity: usize,
    f: F,
) -> Result<impl Fn(A) -> Result<Prefetcher<T>>>
where
    F: Fn(A) -> I,
    I: IntoIterator<Item = Result<T>>,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    let config = PrefetchConfig::with_capacity(capacity);
    config.validate()?;
    Ok(move |arg: A| Prefetcher::try_with_config(f(arg), &config))
}

/// Adds `.prefetch(n)` to every iterator.
///
/// ```ignore
/// use data_utils::PrefetchExt;
///
/// let paths = find_files("data", "*.wav", true)?;
/// for features in paths.into_iter().map(extract).prefetch(4)? {
///     let features = features?;
/// }
/// ```
pub trait PrefetchExt: Iterator + Sized {
    /// Moves this iterator onto a background thread, `capacity` items ahead.
    fn prefetch(self, capacity: usize) -> Result<Prefetcher<Self::Item>>
    where
        Self: Send + 'static,
        Self::Item: Send + 'static,
    {
        Prefetcher::new(self, capacity)
    }

    /// Like [`PrefetchExt::prefetch`] for iterators of `Result<T>`; the first
    /// error ends production.
    fn try_prefetch<T>(self, capacity: usize) -> Result<Prefetcher<T>>
    where
        Self: Iterator<Item = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        Prefetcher::try_new(self, capacity)
    }
}

impl<I: Iterator> PrefetchExt for I {}
