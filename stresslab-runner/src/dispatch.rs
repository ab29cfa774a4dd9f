//! Unit dispatch shared by every validation stage.
//!
//! Units run either sequentially or on the rayon pool. Either way the output
//! vector is in unit-index order, so any reduction done afterwards sees the
//! same sequence regardless of completion order.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Map `f` over `items`, preserving index order.
pub(crate) fn map_units<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Send + Sync,
{
    if parallel {
        items.par_iter().enumerate().map(|(i, t)| f(i, t)).collect()
    } else {
        items.iter().enumerate().map(|(i, t)| f(i, t)).collect()
    }
}

/// Completion counter that logs every `every` completed units.
#[derive(Debug)]
pub(crate) struct Progress {
    stage: &'static str,
    total: usize,
    every: usize,
    done: AtomicUsize,
}

impl Progress {
    pub(crate) fn new(stage: &'static str, total: usize, every: usize) -> Self {
        Self {
            stage,
            total,
            every: every.max(1),
            done: AtomicUsize::new(0),
        }
    }

    /// Record one completion; returns the number completed so far.
    pub(crate) fn tick(&self) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.every == 0 {
            info!(stage = self.stage, completed = done, total = self.total, "progress");
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_map_preserves_order() {
        let items: Vec<usize> = (0..500).collect();
        let seq = map_units(&items, false, |i, v| i * 1000 + v);
        let par = map_units(&items, true, |i, v| i * 1000 + v);
        assert_eq!(seq, par);
    }

    #[test]
    fn progress_counts_completions() {
        let p = Progress::new("test", 3, 2);
        assert_eq!(p.tick(), 1);
        assert_eq!(p.tick(), 2);
        assert_eq!(p.tick(), 3);
    }
}
