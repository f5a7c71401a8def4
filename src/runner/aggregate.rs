//! Thread-safe result sink shared by the execution strategies.
//!
//! Two aggregation shapes exist: a sequence (`Vec<T>`) and a keyed mapping
//! (`HashMap<K, V>` fed by `(K, V)` outcomes). The shape is picked by type, so a keyed run
//! cannot be fed tasks that produce no key.
//!
//! Ordering of a sequence is the order in which [ResultAggregator::record] calls complete:
//! submission order for sequential runs, completion order (non-deterministic between runs)
//! for concurrent ones. Keyed runs resolve duplicate keys by last write wins, which under
//! concurrency means whichever task finished last.

use super::progress::Progress;
use super::retry::Outcome;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Aggregation shape of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    Sequence,
    Keyed,
}

/// Collection that successful task values are merged into.
pub trait Aggregation<T>: Default + Send {
    const MODE: AggregationMode;

    fn insert(&mut self, value: T);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> Aggregation<T> for Vec<T> {
    const MODE: AggregationMode = AggregationMode::Sequence;

    fn insert(&mut self, value: T) {
        self.push(value);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

impl<K, V> Aggregation<(K, V)> for HashMap<K, V>
where
    K: Eq + Hash + Send,
    V: Send,
{
    const MODE: AggregationMode = AggregationMode::Keyed;

    fn insert(&mut self, (key, value): (K, V)) {
        HashMap::insert(self, key, value);
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

/// Counts kept next to the aggregate under the same lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub settled: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Inner<A> {
    aggregate: A,
    tally: Tally,
}

/// Sink for task outcomes. One lock covers the aggregate, the tally and the progress
/// advance, so a record is atomic with respect to every other record.
#[derive(Debug, Default)]
pub struct ResultAggregator<A> {
    inner: Mutex<Inner<A>>,
}

impl<A> ResultAggregator<A> {
    pub fn new() -> Self
    where
        A: Default,
    {
        Self {
            inner: Mutex::new(Inner {
                aggregate: A::default(),
                tally: Tally::default(),
            }),
        }
    }

    /// Merge one settled outcome and advance `progress` by one unit. Absent outcomes are
    /// counted as failed and otherwise dropped.
    pub fn record<T>(&self, outcome: Outcome<T>, progress: &dyn Progress)
    where
        A: Aggregation<T>,
    {
        let mut inner = self.lock();
        match outcome {
            Outcome::Success(value) => {
                inner.aggregate.insert(value);
                inner.tally.succeeded += 1;
            }
            Outcome::Absent => inner.tally.failed += 1,
        }
        inner.tally.settled += 1;
        progress.advance();
    }

    pub fn tally(&self) -> Tally {
        self.lock().tally
    }

    /// Consume the sink and return the aggregate with its tally.
    pub fn into_parts(self) -> (A, Tally) {
        let inner = self
            .inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (inner.aggregate, inner.tally)
    }

    // A poisoned lock only means another recorder panicked mid-insert of a
    // single value; the collection itself is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::progress::NoProgress;
    use std::sync::Arc;

    #[test]
    fn sequence_skips_absent_and_keeps_record_order() {
        let sink: ResultAggregator<Vec<u32>> = ResultAggregator::new();
        sink.record(Outcome::Success(3u32), &NoProgress);
        sink.record(Outcome::<u32>::Absent, &NoProgress);
        sink.record(Outcome::Success(1u32), &NoProgress);
        let (values, tally) = sink.into_parts();
        assert_eq!(values, vec![3, 1]);
        assert_eq!(
            tally,
            Tally {
                settled: 3,
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn keyed_last_write_wins() {
        let sink: ResultAggregator<HashMap<&str, u32>> = ResultAggregator::new();
        sink.record(Outcome::Success(("a", 1u32)), &NoProgress);
        sink.record(Outcome::Success(("b", 2u32)), &NoProgress);
        sink.record(Outcome::Success(("a", 3u32)), &NoProgress);
        sink.record(Outcome::<(&str, u32)>::Absent, &NoProgress);
        let (map, tally) = sink.into_parts();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&3));
        assert_eq!(tally.settled, 4);
        assert_eq!(tally.succeeded, 3);
    }

    #[test]
    fn concurrent_recorders_lose_nothing() {
        let sink: Arc<ResultAggregator<Vec<usize>>> = Arc::new(ResultAggregator::new());
        std::thread::scope(|s| {
            for t in 0..8usize {
                let sink = sink.clone();
                s.spawn(move || {
                    for i in 0..250usize {
                        sink.record(Outcome::Success(t * 1000 + i), &NoProgress);
                    }
                });
            }
        });
        let tally = sink.tally();
        assert_eq!(tally.settled, 2000);
        assert_eq!(tally.succeeded, 2000);
    }

    #[test]
    fn modes_follow_collection_type() {
        assert_eq!(
            <Vec<u8> as Aggregation<u8>>::MODE,
            AggregationMode::Sequence
        );
        assert_eq!(
            <HashMap<u8, u8> as Aggregation<(u8, u8)>>::MODE,
            AggregationMode::Keyed
        );
    }
}
