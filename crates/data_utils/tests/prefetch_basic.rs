//! Ordering, termination and error tests for Prefetcher.
//!
//! Tests cover:
//! - Items arrive in source order, then a single stable termination
//! - Empty sources
//! - Source errors forwarded to the consumer
//! - Wrapper functions produce independent prefetchers

mod common;
use common::failing_source;
use data_utils::prefetch::{
    background, background_with, try_background, PrefetchConfig, PrefetchState, Prefetcher,
};

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

// ================================================================================================
// 1. Ordering and termination
// ================================================================================================
#[test]
fn test_prefetcher_yields_items_then_terminates() -> Result<()> {
    let mut prefetcher = Prefetcher::new(vec![1, 2, 3], 1)?;

    assert_eq!(prefetcher.next().transpose()?, Some(1));
    assert_eq!(prefetcher.next().transpose()?, Some(2));
    assert_eq!(prefetcher.next().transpose()?, Some(3));
    assert!(prefetcher.next().is_none()); // 4th call: termination
    Ok(())
}

#[test]
fn test_prefetcher_termination_is_stable() -> Result<()> {
    let mut prefetcher = Prefetcher::new(0..2, 1)?;
    let items = prefetcher.by_ref().collect::<Result<Vec<_>>>()?;
    assert_eq!(items, vec![0, 1]);

    for _ in 0..5 {
        assert!(prefetcher.next().is_none());
    }
    assert!(prefetcher.is_done());
    assert_eq!(prefetcher.state(), PrefetchState::Drained);
    Ok(())
}

#[test]
fn test_prefetcher_empty_source() -> Result<()> {
    let mut prefetcher = Prefetcher::new(Vec::<String>::new(), 1)?;
    assert!(prefetcher.next().is_none());
    assert!(prefetcher.is_done());
    Ok(())
}

#[test]
fn test_prefetcher_preserves_order_for_long_sources() -> Result<()> {
    for capacity in [1, 2, 7, 64] {
        let items = Prefetcher::new(0..5_000u32, capacity)?.collect::<Result<Vec<_>>>()?;
        assert_eq!(items, (0..5_000u32).collect::<Vec<_>>(), "capacity {}", capacity);
    }
    Ok(())
}

#[test]
fn test_prefetcher_passes_none_values_through() -> Result<()> {
    // Payload values that look like "nothing" must not end the sequence.
    let source = vec![Some(1), None, Some(3), None];
    let items = Prefetcher::new(source.clone(), 2)?.collect::<Result<Vec<_>>>()?;
    assert_eq!(items, source);
    Ok(())
}

#[test]
fn test_prefetcher_with_config() -> Result<()> {
    let config = PrefetchConfig::builder()
        .capacity(3)
        .thread_name("words")
        .build();
    let words = vec!["alpha".to_string(), "beta".to_string()];

    let prefetcher = Prefetcher::with_config(words.clone(), &config)?;
    assert_eq!(prefetcher.capacity(), 3);
    assert_eq!(prefetcher.collect::<Result<Vec<_>>>()?, words);
    Ok(())
}

// ================================================================================================
// 2. Source errors
// ================================================================================================
#[test]
fn test_prefetcher_forwards_error_on_second_pull() -> Result<()> {
    let pulled = Arc::new(AtomicUsize::new(0));
    let mut prefetcher = Prefetcher::try_new(failing_source(5, 2, pulled.clone()), 1)?;

    assert_eq!(prefetcher.next().transpose()?, Some(1));

    let err = prefetcher
        .next()
        .ok_or_else(|| anyhow!("expected an error, got termination"))?
        .unwrap_err();
    assert!(format!("{:#}", err).contains("corrupt record 2"), "got: {:#}", err);
    assert!(err.to_string().contains("item 1"));

    // The error is delivered once; afterwards the prefetcher is drained.
    assert!(prefetcher.next().is_none());
    assert!(prefetcher.is_done());

    // The source is never pulled past the failing element.
    prefetcher.close()?;
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_prefetcher_error_on_first_pull() -> Result<()> {
    let pulled = Arc::new(AtomicUsize::new(0));
    let results: Vec<_> = Prefetcher::try_new(failing_source(3, 1, pulled), 4)?.collect();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
    Ok(())
}

#[test]
fn test_prefetcher_collect_stops_at_error() -> Result<()> {
    let pulled = Arc::new(AtomicUsize::new(0));
    let collected = Prefetcher::try_new(failing_source(10, 6, pulled), 3)?
        .collect::<Result<Vec<_>>>();
    assert!(collected.is_err());
    Ok(())
}

// ================================================================================================
// 3. Wrapper form
// ================================================================================================
#[test]
fn test_background_creates_independent_prefetchers() -> Result<()> {
    let load = background(2, || 0..5)?;

    let mut first = load()?;
    let mut second = load()?;

    // Interleave consumption: each instance has its own buffer and cursor.
    assert_eq!(first.next().transpose()?, Some(0));
    assert_eq!(first.next().transpose()?, Some(1));
    assert_eq!(second.next().transpose()?, Some(0));
    assert_eq!(first.next().transpose()?, Some(2));

    drop(first);
    let rest = second.collect::<Result<Vec<_>>>()?;
    assert_eq!(rest, vec![1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_background_runs_each_call_on_its_own_thread() -> Result<()> {
    let producer_ids = background(2, || {
        std::iter::repeat_with(|| thread::current().id()).take(3)
    })?;

    let first: HashSet<_> = producer_ids()?.collect::<Result<_>>()?;
    let second: HashSet<_> = producer_ids()?.collect::<Result<_>>()?;

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(first.is_disjoint(&second));
    assert!(!first.contains(&thread::current().id()));
    Ok(())
}

#[test]
fn test_background_with_passes_arguments() -> Result<()> {
    let repeat = background_with(2, |(word, times): (&'static str, usize)| {
        std::iter::repeat(word).take(times)
    })?;

    let items = repeat(("ab", 3))?.collect::<Result<Vec<_>>>()?;
    assert_eq!(items, vec!["ab", "ab", "ab"]);

    let items = repeat(("c", 0))?.collect::<Result<Vec<_>>>()?;
    assert!(items.is_empty());
    Ok(())
}

#[test]
fn test_try_background_forwards_errors() -> Result<()> {
    let load = try_background(1, || {
        let pulled = Arc::new(AtomicUsize::new(0));
        failing_source(4, 3, pulled)
    })?;

    let results: Vec<_> = load()?.collect();
    assert_eq!(results.len(), 3);
    assert_eq!(*results[0].as_ref().unwrap(), 1);
    assert_eq!(*results[1].as_ref().unwrap(), 2);
    assert!(results[2].is_err());
    Ok(())
}

#[test]
fn test_background_rejects_zero_capacity() {
    let err = background(0, || 0..3).err().unwrap();
    assert!(err.to_string().contains("capacity"));
}
